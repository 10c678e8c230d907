use crate::utils::constants::bytes_to_blocks;
use serde::Serialize;

// blktrace action categories (upper 16 bits of `action`)
pub const BLK_TC_SHIFT: u32 = 16;
pub const BLK_TC_READ: u32 = 1 << 0;
pub const BLK_TC_WRITE: u32 = 1 << 1;
pub const BLK_TC_FLUSH: u32 = 1 << 2;
pub const BLK_TC_SYNC: u32 = 1 << 3;
pub const BLK_TC_NOTIFY: u32 = 1 << 10;
pub const BLK_TC_DISCARD: u32 = 1 << 13;
pub const BLK_TC_DRV_DATA: u32 = 1 << 14;

/// Moves a category flag into its place in the action word.
pub const fn blk_tc_act(category: u32) -> u32 {
    category << BLK_TC_SHIFT
}

// blktrace base actions (lower 16 bits of `action`)
pub const BLK_TA_QUEUE: u32 = 1;
pub const BLK_TA_BACKMERGE: u32 = 2;
pub const BLK_TA_FRONTMERGE: u32 = 3;
pub const BLK_TA_GETRQ: u32 = 4;
pub const BLK_TA_SLEEPRQ: u32 = 5;
pub const BLK_TA_REQUEUE: u32 = 6;
pub const BLK_TA_ISSUE: u32 = 7;
pub const BLK_TA_COMPLETE: u32 = 8;
pub const BLK_TA_PLUG: u32 = 9;
pub const BLK_TA_UNPLUG_IO: u32 = 10;
pub const BLK_TA_UNPLUG_TIMER: u32 = 11;
pub const BLK_TA_INSERT: u32 = 12;
pub const BLK_TA_SPLIT: u32 = 13;
pub const BLK_TA_BOUNCE: u32 = 14;
pub const BLK_TA_REMAP: u32 = 15;
pub const BLK_TA_ABORT: u32 = 16;
pub const BLK_TA_DRV_DATA: u32 = 17;

/// Kind of a trace record, decoded from its action word.
///
/// `Notify`, `Discard` and `DriverData` are pseudo-events: the stream reader
/// swallows them and they never reach a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    Queue,
    BackMerge,
    FrontMerge,
    GetRq,
    SleepRq,
    Requeue,
    Issue,
    Complete,
    Plug,
    UnplugIo,
    UnplugTimer,
    Insert,
    Split,
    Bounce,
    Remap,
    Abort,
    Notify,
    Discard,
    DriverData,
    Unknown,
}

impl EventKind {
    /// Number of kinds, i.e. the size of a dense table indexed by `index()`.
    pub const COUNT: usize = 20;

    pub const ALL: [EventKind; EventKind::COUNT] = [
        EventKind::Queue,
        EventKind::BackMerge,
        EventKind::FrontMerge,
        EventKind::GetRq,
        EventKind::SleepRq,
        EventKind::Requeue,
        EventKind::Issue,
        EventKind::Complete,
        EventKind::Plug,
        EventKind::UnplugIo,
        EventKind::UnplugTimer,
        EventKind::Insert,
        EventKind::Split,
        EventKind::Bounce,
        EventKind::Remap,
        EventKind::Abort,
        EventKind::Notify,
        EventKind::Discard,
        EventKind::DriverData,
        EventKind::Unknown,
    ];

    pub fn from_action(action: u32) -> Self {
        if action & blk_tc_act(BLK_TC_NOTIFY) != 0 {
            return EventKind::Notify;
        }
        if action & blk_tc_act(BLK_TC_DISCARD) != 0 {
            return EventKind::Discard;
        }
        if action & blk_tc_act(BLK_TC_DRV_DATA) != 0 {
            return EventKind::DriverData;
        }

        match action & 0xffff {
            BLK_TA_QUEUE => EventKind::Queue,
            BLK_TA_BACKMERGE => EventKind::BackMerge,
            BLK_TA_FRONTMERGE => EventKind::FrontMerge,
            BLK_TA_GETRQ => EventKind::GetRq,
            BLK_TA_SLEEPRQ => EventKind::SleepRq,
            BLK_TA_REQUEUE => EventKind::Requeue,
            BLK_TA_ISSUE => EventKind::Issue,
            BLK_TA_COMPLETE => EventKind::Complete,
            BLK_TA_PLUG => EventKind::Plug,
            BLK_TA_UNPLUG_IO => EventKind::UnplugIo,
            BLK_TA_UNPLUG_TIMER => EventKind::UnplugTimer,
            BLK_TA_INSERT => EventKind::Insert,
            BLK_TA_SPLIT => EventKind::Split,
            BLK_TA_BOUNCE => EventKind::Bounce,
            BLK_TA_REMAP => EventKind::Remap,
            BLK_TA_ABORT => EventKind::Abort,
            BLK_TA_DRV_DATA => EventKind::DriverData,
            _ => EventKind::Unknown,
        }
    }

    /// Base action code written into the low 16 bits of the action word.
    pub fn base_action(self) -> u32 {
        match self {
            EventKind::Queue => BLK_TA_QUEUE,
            EventKind::BackMerge => BLK_TA_BACKMERGE,
            EventKind::FrontMerge => BLK_TA_FRONTMERGE,
            EventKind::GetRq => BLK_TA_GETRQ,
            EventKind::SleepRq => BLK_TA_SLEEPRQ,
            EventKind::Requeue => BLK_TA_REQUEUE,
            EventKind::Issue => BLK_TA_ISSUE,
            EventKind::Complete => BLK_TA_COMPLETE,
            EventKind::Plug => BLK_TA_PLUG,
            EventKind::UnplugIo => BLK_TA_UNPLUG_IO,
            EventKind::UnplugTimer => BLK_TA_UNPLUG_TIMER,
            EventKind::Insert => BLK_TA_INSERT,
            EventKind::Split => BLK_TA_SPLIT,
            EventKind::Bounce => BLK_TA_BOUNCE,
            EventKind::Remap => BLK_TA_REMAP,
            EventKind::Abort => BLK_TA_ABORT,
            EventKind::Notify => blk_tc_act(BLK_TC_NOTIFY),
            EventKind::Discard => blk_tc_act(BLK_TC_DISCARD),
            EventKind::DriverData => BLK_TA_DRV_DATA | blk_tc_act(BLK_TC_DRV_DATA),
            EventKind::Unknown => 0,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_pseudo(self) -> bool {
        matches!(
            self,
            EventKind::Notify | EventKind::Discard | EventKind::DriverData
        )
    }

    /// blkparse-style one letter code.
    pub fn code(self) -> char {
        match self {
            EventKind::Queue => 'Q',
            EventKind::BackMerge => 'M',
            EventKind::FrontMerge => 'F',
            EventKind::GetRq => 'G',
            EventKind::SleepRq => 'S',
            EventKind::Requeue => 'R',
            EventKind::Issue => 'D',
            EventKind::Complete => 'C',
            EventKind::Plug => 'P',
            EventKind::UnplugIo => 'U',
            EventKind::UnplugTimer => 'T',
            EventKind::Insert => 'I',
            EventKind::Split => 'X',
            EventKind::Bounce => 'B',
            EventKind::Remap => 'A',
            EventKind::Abort => 'K',
            EventKind::Notify => 'N',
            EventKind::Discard => 'd',
            EventKind::DriverData => 'v',
            EventKind::Unknown => '?',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Read,
    Write,
}

impl Direction {
    pub fn index(self) -> usize {
        match self {
            Direction::Read => 0,
            Direction::Write => 1,
        }
    }

    pub fn code(self) -> char {
        match self {
            Direction::Read => 'R',
            Direction::Write => 'W',
        }
    }
}

/// One decoded blktrace record. Immutable once decoded; `time` is relative to
/// the device genesis once it has been surfaced by the stream merger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub sequence: u32,
    pub time: u64,
    pub sector: u64,
    pub bytes: u32,
    pub action: u32,
    pub pid: u32,
    pub device: u32,
    pub cpu: u32,
    pub error: u16,
    pub pdu: Vec<u8>,
}

impl TraceEvent {
    /// Builds an event without payload; the remaining header fields are zero.
    pub fn new(time: u64, sector: u64, bytes: u32, action: u32) -> Self {
        Self {
            sequence: 0,
            time,
            sector,
            bytes,
            action,
            pid: 0,
            device: 0,
            cpu: 0,
            error: 0,
            pdu: Vec::new(),
        }
    }

    /// Shorthand for an event of the given kind and direction.
    pub fn of_kind(kind: EventKind, direction: Direction, time: u64, sector: u64, bytes: u32) -> Self {
        let category = match direction {
            Direction::Read => BLK_TC_READ,
            Direction::Write => BLK_TC_WRITE,
        };
        Self::new(time, sector, bytes, kind.base_action() | blk_tc_act(category))
    }

    pub fn kind(&self) -> EventKind {
        EventKind::from_action(self.action)
    }

    pub fn is_pseudo(&self) -> bool {
        self.kind().is_pseudo()
    }

    pub fn direction(&self) -> Direction {
        if self.action & blk_tc_act(BLK_TC_WRITE) != 0 {
            Direction::Write
        } else {
            Direction::Read
        }
    }

    /// Request size in 512-byte blocks.
    pub fn blocks(&self) -> u64 {
        bytes_to_blocks(self.bytes)
    }

    pub fn major(&self) -> u32 {
        self.device >> 20
    }

    pub fn minor(&self) -> u32 {
        self.device & ((1 << 20) - 1)
    }
}

impl std::fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{} {} {} {}.{:09} {} {} {} {} + {}",
            self.major(),
            self.minor(),
            self.cpu,
            self.sequence,
            self.time / 1_000_000_000,
            self.time % 1_000_000_000,
            self.pid,
            self.kind().code(),
            self.direction().code(),
            self.sector,
            self.blocks()
        )
    }
}
