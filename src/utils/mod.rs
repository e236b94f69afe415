pub(crate) mod async_task;
pub(crate) use async_task::spawn_task;
