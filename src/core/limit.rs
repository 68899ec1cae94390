//! Static capacity budgets used by admission control.
//!
//! A [`ResourceLimit`] is plain data: it never changes after construction and
//! only knows how to compare a prospective [`ResourceUsage`] against itself.
//! The [`Limiter`] groups the node-wide (system) limit with optional
//! per-priority-class overrides.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One gibibyte.
pub const GIB: i64 = 1024 * 1024 * 1024;
/// One mebibyte.
pub const MIB: i64 = 1024 * 1024;

/// Default memory budget (8 GiB host, 90% reserved for tasks).
pub const DEFAULT_MEMORY_LIMIT: i64 = 8 * GIB * 9 / 10;
/// Default ceiling for all live tasks.
pub const DEFAULT_TASK_TOTAL_LIMIT: i64 = 10_240;
/// Default ceiling for high priority tasks.
pub const DEFAULT_HIGH_TASK_LIMIT: i64 = 128;
/// Default ceiling for medium priority tasks.
pub const DEFAULT_MEDIUM_TASK_LIMIT: i64 = 1_024;
/// Default ceiling for low priority tasks.
pub const DEFAULT_LOW_TASK_LIMIT: i64 = 16;

/// Scheduling tier of a task. Each tier has its own capacity ceiling.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PriorityClass {
    /// Background work (garbage collection).
    Low,
    /// Replication, sealing, receive confirmation.
    Medium,
    /// Interactive work (approval, upload, download).
    High,
}

impl PriorityClass {
    /// All classes, highest first.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Dense index, `0` for High.
    pub const fn rank(self) -> usize {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    /// Lowercase name for logs and metrics labels.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of the connections a reservation books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnDirection {
    /// Connections accepted from peers.
    Inbound,
    /// Connections dialed to peers.
    #[default]
    Outbound,
}

/// A budget dimension that admission control checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Memory bytes.
    Memory,
    /// All tasks regardless of class.
    TasksTotal,
    /// High priority tasks.
    TasksHigh,
    /// Medium priority tasks.
    TasksMedium,
    /// Low priority tasks.
    TasksLow,
    /// File descriptors.
    Fd,
    /// All connections.
    ConnsTotal,
    /// Inbound connections.
    ConnsInbound,
    /// Outbound connections.
    ConnsOutbound,
}

impl Dimension {
    /// Task dimension for a priority class.
    pub const fn tasks_of(class: PriorityClass) -> Self {
        match class {
            PriorityClass::High => Self::TasksHigh,
            PriorityClass::Medium => Self::TasksMedium,
            PriorityClass::Low => Self::TasksLow,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::TasksTotal => "tasks",
            Self::TasksHigh => "high priority tasks",
            Self::TasksMedium => "medium priority tasks",
            Self::TasksLow => "low priority tasks",
            Self::Fd => "file descriptors",
            Self::ConnsTotal => "connections",
            Self::ConnsInbound => "inbound connections",
            Self::ConnsOutbound => "outbound connections",
        };
        f.write_str(name)
    }
}

/// Immutable capacity budget.
///
/// `task_high + task_medium + task_low <= task_total` is a guideline only;
/// every counter is enforced on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimit {
    /// Memory bytes.
    pub memory_bytes: i64,
    /// Live tasks of any class.
    pub task_total: i64,
    /// Live high priority tasks.
    pub task_high: i64,
    /// Live medium priority tasks.
    pub task_medium: i64,
    /// Live low priority tasks.
    pub task_low: i64,
    /// Open file descriptors.
    pub fd: i64,
    /// Connections in either direction.
    pub conn_total: i64,
    /// Inbound connections.
    pub conn_inbound: i64,
    /// Outbound connections.
    pub conn_outbound: i64,
}

impl Default for ResourceLimit {
    fn default() -> Self {
        Self {
            memory_bytes: DEFAULT_MEMORY_LIMIT,
            task_total: DEFAULT_TASK_TOTAL_LIMIT,
            task_high: DEFAULT_HIGH_TASK_LIMIT,
            task_medium: DEFAULT_MEDIUM_TASK_LIMIT,
            task_low: DEFAULT_LOW_TASK_LIMIT,
            fd: i64::from(i32::MAX),
            conn_total: i64::from(i32::MAX),
            conn_inbound: i64::from(i32::MAX),
            conn_outbound: i64::from(i32::MAX),
        }
    }
}

impl ResourceLimit {
    /// A limit that admits everything.
    pub const fn unlimited() -> Self {
        Self {
            memory_bytes: i64::MAX,
            task_total: i64::MAX,
            task_high: i64::MAX,
            task_medium: i64::MAX,
            task_low: i64::MAX,
            fd: i64::MAX,
            conn_total: i64::MAX,
            conn_inbound: i64::MAX,
            conn_outbound: i64::MAX,
        }
    }

    /// Task ceiling for one class.
    pub const fn task_limit(&self, class: PriorityClass) -> i64 {
        match class {
            PriorityClass::High => self.task_high,
            PriorityClass::Medium => self.task_medium,
            PriorityClass::Low => self.task_low,
        }
    }

    /// Check a prospective usage, naming the first dimension it exceeds.
    pub fn admits(&self, usage: &ResourceUsage) -> Result<(), Dimension> {
        let checks = [
            (usage.memory_bytes, self.memory_bytes, Dimension::Memory),
            (usage.tasks_total(), self.task_total, Dimension::TasksTotal),
            (usage.tasks_high, self.task_high, Dimension::TasksHigh),
            (usage.tasks_medium, self.task_medium, Dimension::TasksMedium),
            (usage.tasks_low, self.task_low, Dimension::TasksLow),
            (usage.fd, self.fd, Dimension::Fd),
            (usage.conns_total(), self.conn_total, Dimension::ConnsTotal),
            (usage.conns_inbound, self.conn_inbound, Dimension::ConnsInbound),
            (usage.conns_outbound, self.conn_outbound, Dimension::ConnsOutbound),
        ];
        match checks.iter().find(|(used, limit, _)| used > limit) {
            Some((_, _, dimension)) => Err(*dimension),
            None => Ok(()),
        }
    }

    /// Names of negative fields, used by config validation.
    pub fn negative_fields(&self) -> Vec<&'static str> {
        [
            ("memory_bytes", self.memory_bytes),
            ("task_total", self.task_total),
            ("task_high", self.task_high),
            ("task_medium", self.task_medium),
            ("task_low", self.task_low),
            ("fd", self.fd),
            ("conn_total", self.conn_total),
            ("conn_inbound", self.conn_inbound),
            ("conn_outbound", self.conn_outbound),
        ]
        .into_iter()
        .filter(|(_, v)| *v < 0)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Amounts a caller asks admission control for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Class whose ceiling the request counts against.
    pub class: PriorityClass,
    /// Memory bytes.
    pub memory_bytes: i64,
    /// File descriptors.
    pub fd: i64,
    /// Connections.
    pub conns: i64,
    /// Direction of `conns`.
    pub direction: ConnDirection,
}

impl ResourceRequest {
    /// A request for one task slot and nothing else.
    pub const fn new(class: PriorityClass) -> Self {
        Self {
            class,
            memory_bytes: 0,
            fd: 0,
            conns: 0,
            direction: ConnDirection::Outbound,
        }
    }

    /// Set the memory amount.
    #[must_use]
    pub const fn with_memory(mut self, bytes: i64) -> Self {
        self.memory_bytes = bytes;
        self
    }

    /// Set the file descriptor count.
    #[must_use]
    pub const fn with_fd(mut self, fd: i64) -> Self {
        self.fd = fd;
        self
    }

    /// Set the connection count and direction.
    #[must_use]
    pub const fn with_conns(mut self, conns: i64, direction: ConnDirection) -> Self {
        self.conns = conns;
        self.direction = direction;
        self
    }

    /// True if any amount is negative.
    pub const fn is_negative(&self) -> bool {
        self.memory_bytes < 0 || self.fd < 0 || self.conns < 0
    }
}

/// Booked usage, either node-wide or for a single class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Memory bytes.
    pub memory_bytes: i64,
    /// Live high priority tasks.
    pub tasks_high: i64,
    /// Live medium priority tasks.
    pub tasks_medium: i64,
    /// Live low priority tasks.
    pub tasks_low: i64,
    /// File descriptors.
    pub fd: i64,
    /// Inbound connections.
    pub conns_inbound: i64,
    /// Outbound connections.
    pub conns_outbound: i64,
}

impl ResourceUsage {
    /// Live tasks of every class.
    pub const fn tasks_total(&self) -> i64 {
        self.tasks_high
            .saturating_add(self.tasks_medium)
            .saturating_add(self.tasks_low)
    }

    /// Connections in both directions.
    pub const fn conns_total(&self) -> i64 {
        self.conns_inbound.saturating_add(self.conns_outbound)
    }

    /// Live tasks of one class.
    pub const fn tasks_of(&self, class: PriorityClass) -> i64 {
        match class {
            PriorityClass::High => self.tasks_high,
            PriorityClass::Medium => self.tasks_medium,
            PriorityClass::Low => self.tasks_low,
        }
    }

    /// Usage with `request` added, or `None` if a counter would overflow.
    pub fn checked_plus(mut self, request: &ResourceRequest) -> Option<Self> {
        self.memory_bytes = self.memory_bytes.checked_add(request.memory_bytes)?;
        self.fd = self.fd.checked_add(request.fd)?;
        let conns = match request.direction {
            ConnDirection::Inbound => &mut self.conns_inbound,
            ConnDirection::Outbound => &mut self.conns_outbound,
        };
        *conns = conns.checked_add(request.conns)?;
        let tasks = self.tasks_mut(request.class);
        *tasks = tasks.checked_add(1)?;
        Some(self)
    }

    /// Usage with a previously added `request` removed.
    #[must_use]
    pub fn minus(mut self, request: &ResourceRequest) -> Self {
        self.memory_bytes = self.memory_bytes.saturating_sub(request.memory_bytes);
        self.fd = self.fd.saturating_sub(request.fd);
        let conns = match request.direction {
            ConnDirection::Inbound => &mut self.conns_inbound,
            ConnDirection::Outbound => &mut self.conns_outbound,
        };
        *conns = conns.saturating_sub(request.conns);
        let tasks = self.tasks_mut(request.class);
        *tasks = tasks.saturating_sub(1);
        self
    }

    fn tasks_mut(&mut self, class: PriorityClass) -> &mut i64 {
        match class {
            PriorityClass::High => &mut self.tasks_high,
            PriorityClass::Medium => &mut self.tasks_medium,
            PriorityClass::Low => &mut self.tasks_low,
        }
    }
}

/// System limit plus optional per-class overrides.
///
/// The system limit carries the per-class task ceilings and the shared
/// global ceilings. An override additionally caps the usage booked by its
/// own class on every dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limiter {
    /// Node-wide limit.
    pub system: ResourceLimit,
    /// Extra cap for high priority usage.
    pub high: Option<ResourceLimit>,
    /// Extra cap for medium priority usage.
    pub medium: Option<ResourceLimit>,
    /// Extra cap for low priority usage.
    pub low: Option<ResourceLimit>,
}

impl Limiter {
    /// Limiter with only a system limit.
    pub const fn new(system: ResourceLimit) -> Self {
        Self {
            system,
            high: None,
            medium: None,
            low: None,
        }
    }

    /// Attach an override for one class.
    #[must_use]
    pub const fn with_class_limit(mut self, class: PriorityClass, limit: ResourceLimit) -> Self {
        match class {
            PriorityClass::High => self.high = Some(limit),
            PriorityClass::Medium => self.medium = Some(limit),
            PriorityClass::Low => self.low = Some(limit),
        }
        self
    }

    /// Override for a class, if configured.
    pub const fn class_limit(&self, class: PriorityClass) -> Option<&ResourceLimit> {
        match class {
            PriorityClass::High => self.high.as_ref(),
            PriorityClass::Medium => self.medium.as_ref(),
            PriorityClass::Low => self.low.as_ref(),
        }
    }

    /// Effective limit governing a class: its override, else the system limit.
    pub fn limits_of(&self, class: PriorityClass) -> ResourceLimit {
        self.class_limit(class).copied().unwrap_or(self.system)
    }
}
