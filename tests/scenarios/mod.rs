mod control_plane;
mod disclosure;
mod lifecycle;
mod relay_dispatch;
mod relay_files;
