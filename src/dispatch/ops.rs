use std::fmt;

use crate::wire::AddressRecord;
use crate::wire::ChannelKind;
use crate::wire::DisclosedNodeRecord;
use crate::wire::EdgeRecord;
use crate::wire::FileNameRecord;
use crate::wire::IfcContextRecord;
use crate::wire::InodeRecord;
use crate::wire::MsgQueueRecord;
use crate::wire::Record;
use crate::wire::RecordTag;
use crate::wire::SharedMemoryRecord;
use crate::wire::SocketRecord;
use crate::wire::StringRecord;
use crate::wire::TaskRecord;
use crate::HandlerResult;

/// Typed per-record handler.
pub type Handler<T> = Box<dyn Fn(T) -> HandlerResult + Send + Sync>;

/// Pre-dispatch predicate; `true` drops the record.
pub type RecordPredicate = Box<dyn Fn(&Record) -> bool + Send + Sync>;

/// Runs once during `register`, before any record is dispatched.
pub type InitHook = Box<dyn FnOnce() + Send>;

macro_rules! handler_setters {
    ($($(#[$doc:meta])* $method:ident => $field:ident: $record:ty;)*) => {
        $(
            $(#[$doc])*
            pub fn $method(
                mut self,
                handler: impl Fn($record) -> HandlerResult + Send + Sync + 'static,
            ) -> Self {
                self.table.$field = Some(Box::new(handler));
                self
            }
        )*
    };
}

/// Application handler set handed to [`crate::Provenance::register`].
///
/// Every slot is optional. Records whose tag has no handler are dropped
/// without consulting filters.
///
/// ```ignore
/// let ops = ProvenanceOps::new()
///     .filter(|record| matches!(record, Record::Task(t) if t.uid == 0))
///     .on_task(|task| {
///         println!("{} ran", task.pid);
///         Ok(())
///     });
/// ```
#[derive(Default)]
pub struct ProvenanceOps {
    init: Option<InitHook>,
    table: HandlerTable,
}

impl ProvenanceOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_init(
        mut self,
        init: impl FnOnce() + Send + 'static,
    ) -> Self {
        self.init = Some(Box::new(init));
        self
    }

    /// Predicate consulted for short records after the filter masks.
    pub fn filter(
        mut self,
        predicate: impl Fn(&Record) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.table.filter = Some(Box::new(predicate));
        self
    }

    /// Predicate consulted for long records after the filter masks.
    pub fn long_filter(
        mut self,
        predicate: impl Fn(&Record) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.table.long_filter = Some(Box::new(predicate));
        self
    }

    handler_setters! {
        on_edge => edge: EdgeRecord;
        on_task => task: TaskRecord;
        on_inode => inode: InodeRecord;
        on_string => string: StringRecord;
        /// Receives nodes disclosed by any process, including this one.
        on_disclosed_node => disclosed_node: DisclosedNodeRecord;
        on_msg_queue => msg_queue: MsgQueueRecord;
        on_shared_memory => shared_memory: SharedMemoryRecord;
        on_socket => socket: SocketRecord;
        on_address => address: AddressRecord;
        on_file_name => file_name: FileNameRecord;
        on_ifc_context => ifc_context: IfcContextRecord;
    }

    pub fn handles(
        &self,
        tag: RecordTag,
    ) -> bool {
        self.table.has_handler(tag)
    }

    pub(crate) fn into_parts(self) -> (Option<InitHook>, HandlerTable) {
        (self.init, self.table)
    }
}

impl fmt::Debug for ProvenanceOps {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ProvenanceOps")
            .field("init", &self.init.is_some())
            .field("table", &self.table)
            .finish()
    }
}

/// Handlers fixed for the duration of one registration.
#[derive(Default)]
pub(crate) struct HandlerTable {
    filter: Option<RecordPredicate>,
    long_filter: Option<RecordPredicate>,
    edge: Option<Handler<EdgeRecord>>,
    task: Option<Handler<TaskRecord>>,
    inode: Option<Handler<InodeRecord>>,
    string: Option<Handler<StringRecord>>,
    disclosed_node: Option<Handler<DisclosedNodeRecord>>,
    msg_queue: Option<Handler<MsgQueueRecord>>,
    shared_memory: Option<Handler<SharedMemoryRecord>>,
    socket: Option<Handler<SocketRecord>>,
    address: Option<Handler<AddressRecord>>,
    file_name: Option<Handler<FileNameRecord>>,
    ifc_context: Option<Handler<IfcContextRecord>>,
}

impl HandlerTable {
    pub fn has_handler(
        &self,
        tag: RecordTag,
    ) -> bool {
        match tag {
            RecordTag::Edge => self.edge.is_some(),
            RecordTag::Task => self.task.is_some(),
            RecordTag::Inode => self.inode.is_some(),
            RecordTag::String => self.string.is_some(),
            RecordTag::DisclosedNode => self.disclosed_node.is_some(),
            RecordTag::MsgQueue => self.msg_queue.is_some(),
            RecordTag::SharedMemory => self.shared_memory.is_some(),
            RecordTag::Socket => self.socket.is_some(),
            RecordTag::Address => self.address.is_some(),
            RecordTag::FileName => self.file_name.is_some(),
            RecordTag::IfcContext => self.ifc_context.is_some(),
        }
    }

    pub fn handled_tags(&self) -> Vec<RecordTag> {
        RecordTag::ALL
            .into_iter()
            .filter(|tag| self.has_handler(*tag))
            .collect()
    }

    pub(crate) fn predicate(
        &self,
        kind: ChannelKind,
    ) -> Option<&RecordPredicate> {
        match kind {
            ChannelKind::Short => self.filter.as_ref(),
            ChannelKind::Long => self.long_filter.as_ref(),
        }
    }

    /// Hands `record` to its handler. A missing handler is a no-op.
    pub(crate) fn invoke(
        &self,
        record: Record,
    ) -> HandlerResult {
        fn call<T>(
            handler: &Option<Handler<T>>,
            record: T,
        ) -> HandlerResult {
            match handler {
                Some(handler) => handler(record),
                None => Ok(()),
            }
        }

        match record {
            Record::Edge(r) => call(&self.edge, r),
            Record::Task(r) => call(&self.task, r),
            Record::Inode(r) => call(&self.inode, r),
            Record::String(r) => call(&self.string, r),
            Record::DisclosedNode(r) => call(&self.disclosed_node, r),
            Record::MsgQueue(r) => call(&self.msg_queue, r),
            Record::SharedMemory(r) => call(&self.shared_memory, r),
            Record::Socket(r) => call(&self.socket, r),
            Record::Address(r) => call(&self.address, r),
            Record::FileName(r) => call(&self.file_name, r),
            Record::IfcContext(r) => call(&self.ifc_context, r),
        }
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("filter", &self.filter.is_some())
            .field("long_filter", &self.long_filter.is_some())
            .field("handled", &self.handled_tags())
            .finish()
    }
}
