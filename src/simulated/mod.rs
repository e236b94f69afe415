//! In-process stand-in for the kernel capture subsystem.
//!
//! [`SimulatedKernel`] implements both [`ControlChannel`] and
//! [`ChannelOpener`] so a [`crate::Provenance`] can run end to end without
//! the kernel module: records are injected by the caller, disclosures are
//! stamped and echoed back through the relay, and privileged control calls
//! are refused unless the kernel was told the caller is privileged.
//!
//! Injected records bypass the simulated kernel's own flags and filters.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use tracing::trace;

use crate::channel::memory_channel;
use crate::channel::ChannelOpener;
use crate::channel::MemoryChannelSender;
use crate::channel::RecordChannel;
use crate::control::ControlChannel;
use crate::control::DisclosureKind;
use crate::control::FilterOp;
use crate::control::Flag;
use crate::control::Word;
use crate::filter::FilterTarget;
use crate::wire::decode;
use crate::wire::encode;
use crate::wire::ChannelKind;
use crate::wire::NodeIdentifier;
use crate::wire::Record;
use crate::wire::TaskRecord;
use crate::DecodeError;
use crate::Error;
use crate::Result;

const BOOT_ID: u32 = 1;

#[derive(Debug)]
struct KernelState {
    present: bool,
    privileged: bool,
    cpus: u32,

    enable: bool,
    capture_all: bool,
    opaque: bool,
    tracked: bool,
    node_filter: u32,
    edge_filter: u32,
    machine_id: u32,

    next_node_id: u64,
    next_edge_id: u64,
    jiffies: u64,
    self_task: TaskRecord,
    disclosures: Vec<Record>,

    short_senders: Vec<MemoryChannelSender>,
    long_senders: Vec<MemoryChannelSender>,
}

impl KernelState {
    fn senders(
        &self,
        kind: ChannelKind,
    ) -> &[MemoryChannelSender] {
        match kind {
            ChannelKind::Short => &self.short_senders,
            ChannelKind::Long => &self.long_senders,
        }
    }

    fn check_present(&self) -> Result<()> {
        if self.present {
            Ok(())
        } else {
            Err(Error::SubsystemAbsent)
        }
    }

    fn check_privileged(
        &self,
        operation: &'static str,
    ) -> Result<()> {
        self.check_present()?;
        if self.privileged {
            Ok(())
        } else {
            Err(Error::PermissionDenied { operation })
        }
    }

    fn word(
        &self,
        word: Word,
    ) -> u32 {
        match word {
            Word::NodeFilter => self.node_filter,
            Word::EdgeFilter => self.edge_filter,
            Word::MachineId => self.machine_id,
        }
    }

    fn word_mut(
        &mut self,
        word: Word,
    ) -> &mut u32 {
        match word {
            Word::NodeFilter => &mut self.node_filter,
            Word::EdgeFilter => &mut self.edge_filter,
            Word::MachineId => &mut self.machine_id,
        }
    }

    fn flag(
        &self,
        flag: Flag,
    ) -> bool {
        match flag {
            Flag::Enable => self.enable,
            Flag::CaptureAll => self.capture_all,
            Flag::Opaque => self.opaque,
            Flag::Tracked => self.tracked,
        }
    }

    fn flag_mut(
        &mut self,
        flag: Flag,
    ) -> &mut bool {
        match flag {
            Flag::Enable => &mut self.enable,
            Flag::CaptureAll => &mut self.capture_all,
            Flag::Opaque => &mut self.opaque,
            Flag::Tracked => &mut self.tracked,
        }
    }

    fn stamp(
        &mut self,
        record: Record,
    ) -> Record {
        match record {
            Record::DisclosedNode(mut node) => {
                self.next_node_id += 1;
                node.identifier = NodeIdentifier {
                    id: self.next_node_id,
                    boot_id: BOOT_ID,
                    machine_id: self.machine_id,
                    version: 1,
                };
                Record::DisclosedNode(node)
            }
            Record::Edge(mut edge) => {
                self.next_edge_id += 1;
                self.jiffies += 1;
                edge.id = self.next_edge_id;
                edge.jiffies = self.jiffies;
                Record::Edge(edge)
            }
            other => other,
        }
    }
}

/// Whether writing `flag` needs privilege on the simulated kernel.
///
/// Any process may change its own tracking; the other switches are reserved.
fn requires_privilege(flag: Flag) -> bool {
    flag != Flag::Tracked
}

#[derive(Debug, Clone)]
pub struct SimulatedKernel {
    state: Arc<Mutex<KernelState>>,
}

impl Default for SimulatedKernel {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SimulatedKernel {
    /// Present, privileged kernel exposing `cpus` short and long channels.
    pub fn new(cpus: u32) -> Self {
        let self_task = TaskRecord {
            identifier: NodeIdentifier {
                id: 1,
                boot_id: BOOT_ID,
                machine_id: 0,
                version: 1,
            },
            uid: 0,
            gid: 0,
            pid: std::process::id(),
            vpid: std::process::id(),
            utime: 0,
            stime: 0,
            vm: 0,
            rss: 0,
        };
        Self {
            state: Arc::new(Mutex::new(KernelState {
                present: true,
                privileged: true,
                cpus: cpus.max(1),
                enable: false,
                capture_all: false,
                opaque: false,
                tracked: false,
                node_filter: 0,
                edge_filter: 0,
                machine_id: 0,
                next_node_id: 1,
                next_edge_id: 0,
                jiffies: 0,
                self_task,
                disclosures: Vec::new(),
                short_senders: Vec::new(),
                long_senders: Vec::new(),
            })),
        }
    }

    pub fn set_privileged(
        &self,
        privileged: bool,
    ) {
        self.state.lock().privileged = privileged;
    }

    /// Simulates loading or unloading the kernel module.
    pub fn set_present(
        &self,
        present: bool,
    ) {
        self.state.lock().present = present;
    }

    pub fn set_self_task(
        &self,
        task: TaskRecord,
    ) {
        self.state.lock().self_task = task;
    }

    /// Current flag value, regardless of privilege.
    pub fn flag(
        &self,
        flag: Flag,
    ) -> bool {
        self.state.lock().flag(flag)
    }

    /// Current word value, regardless of privilege.
    pub fn word(
        &self,
        word: Word,
    ) -> u32 {
        self.state.lock().word(word)
    }

    /// Disclosed records accepted so far, with kernel-assigned fields filled.
    pub fn disclosures(&self) -> Vec<Record> {
        self.state.lock().disclosures.clone()
    }

    /// Emits `record` on CPU 0 of its channel class.
    ///
    /// Returns `Ok(false)` when no registration is reading that channel.
    pub fn inject(
        &self,
        record: &Record,
    ) -> Result<bool> {
        self.inject_on(0, record)
    }

    pub fn inject_on(
        &self,
        cpu: u32,
        record: &Record,
    ) -> Result<bool> {
        let bytes = encode(record)?;
        Ok(self.inject_raw(record.channel(), cpu, bytes))
    }

    /// Emits raw bytes as one frame, valid or not.
    pub fn inject_raw(
        &self,
        kind: ChannelKind,
        cpu: u32,
        bytes: Vec<u8>,
    ) -> bool {
        let state = self.state.lock();
        match state.senders(kind).get(cpu as usize) {
            Some(sender) => {
                trace!(channel = sender.name(), len = bytes.len(), "simulated record");
                sender.send(bytes)
            }
            None => false,
        }
    }

    /// Makes the next read on the given channel fail.
    pub fn fail_channel(
        &self,
        kind: ChannelKind,
        cpu: u32,
        message: &str,
    ) -> bool {
        let state = self.state.lock();
        state
            .senders(kind)
            .get(cpu as usize)
            .map(|sender| sender.fail(io::ErrorKind::BrokenPipe, message))
            .unwrap_or(false)
    }

    /// Ends every open channel stream, as when the module is unloaded.
    pub fn hang_up(&self) {
        let mut state = self.state.lock();
        state.short_senders.clear();
        state.long_senders.clear();
    }
}

impl ChannelOpener for SimulatedKernel {
    fn open_channels(&self) -> Result<Vec<Arc<dyn RecordChannel>>> {
        let mut state = self.state.lock();
        state.check_present()?;

        let mut channels: Vec<Arc<dyn RecordChannel>> = Vec::new();
        let mut short_senders = Vec::new();
        let mut long_senders = Vec::new();
        for cpu in 0..state.cpus {
            let (sender, channel) = memory_channel(format!("provenance{cpu}"), ChannelKind::Short);
            short_senders.push(sender);
            channels.push(Arc::new(channel));
        }
        for cpu in 0..state.cpus {
            let (sender, channel) =
                memory_channel(format!("long_provenance{cpu}"), ChannelKind::Long);
            long_senders.push(sender);
            channels.push(Arc::new(channel));
        }
        state.short_senders = short_senders;
        state.long_senders = long_senders;

        debug!(cpus = state.cpus, "simulated kernel opened relay channels");
        Ok(channels)
    }
}

impl ControlChannel for SimulatedKernel {
    fn probe(&self) -> bool {
        self.state.lock().present
    }

    fn get_flag(
        &self,
        flag: Flag,
    ) -> Result<bool> {
        let state = self.state.lock();
        state.check_present()?;
        Ok(state.flag(flag))
    }

    fn set_flag(
        &self,
        flag: Flag,
        value: bool,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if requires_privilege(flag) {
            state.check_privileged(flag.set_operation())?;
        } else {
            state.check_present()?;
        }
        *state.flag_mut(flag) = value;
        Ok(())
    }

    fn get_u32(
        &self,
        word: Word,
    ) -> Result<u32> {
        let state = self.state.lock();
        match word {
            Word::MachineId => state.check_present()?,
            Word::NodeFilter | Word::EdgeFilter => state.check_privileged(word.get_operation())?,
        }
        Ok(state.word(word))
    }

    fn set_u32(
        &self,
        word: Word,
        value: u32,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.check_privileged(word.set_operation())?;
        *state.word_mut(word) = value;
        Ok(())
    }

    fn update_filter(
        &self,
        target: FilterTarget,
        op: FilterOp,
        mask: u32,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.check_privileged(op.operation(target))?;
        let current = state.word_mut(Word::for_filter(target));
        match op {
            FilterOp::Add => *current |= mask,
            FilterOp::Remove => *current &= !mask,
        }
        Ok(())
    }

    fn submit_disclosure(
        &self,
        kind: DisclosureKind,
        payload: &[u8],
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.check_present()?;

        let channel = match kind {
            DisclosureKind::Node => ChannelKind::Long,
            DisclosureKind::Edge => ChannelKind::Short,
        };
        let record = decode(payload, channel)?;
        let accepted = matches!(
            (kind, &record),
            (DisclosureKind::Node, Record::DisclosedNode(_)) | (DisclosureKind::Edge, Record::Edge(_))
        );
        if !accepted {
            return Err(DecodeError::InvalidField {
                field: "tag",
                value: record.tag().wire_value() as u64,
            }
            .into());
        }

        let record = state.stamp(record);
        let bytes = encode(&record)?;
        let echoed = state
            .senders(channel)
            .first()
            .is_some_and(|sender| sender.send(bytes));
        if !echoed {
            trace!(operation = kind.operation(), "disclosure not echoed, no relay reader");
        }
        debug!(operation = kind.operation(), echoed, "simulated kernel accepted disclosure");
        state.disclosures.push(record);
        Ok(())
    }

    fn read_self(&self) -> Result<Vec<u8>> {
        let state = self.state.lock();
        state.check_present()?;
        let mut task = state.self_task.clone();
        task.identifier.machine_id = state.machine_id;
        encode(&Record::Task(task))
    }
}
