//! Lock modes requested for SELECT statements.

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LockMode {
    #[default]
    None,
    Read,
    Optimistic,
    OptimisticForceIncrement,
    PessimisticRead,
    PessimisticWrite,
    PessimisticForceIncrement,
    UpgradeNowait,
    UpgradeSkipLocked,
}

impl LockMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "none" => Some(Self::None),
            "read" => Some(Self::Read),
            "optimistic" => Some(Self::Optimistic),
            "optimistic_force_increment" => Some(Self::OptimisticForceIncrement),
            "pessimistic_read" => Some(Self::PessimisticRead),
            "pessimistic_write" | "upgrade" => Some(Self::PessimisticWrite),
            "pessimistic_force_increment" => Some(Self::PessimisticForceIncrement),
            "upgrade_nowait" => Some(Self::UpgradeNowait),
            "upgrade_skiplocked" | "upgrade_skip_locked" => Some(Self::UpgradeSkipLocked),
            _ => None,
        }
    }

    /// Whether the mode needs a database-level row lock.
    pub fn is_pessimistic(self) -> bool {
        matches!(
            self,
            Self::PessimisticRead
                | Self::PessimisticWrite
                | Self::PessimisticForceIncrement
                | Self::UpgradeNowait
                | Self::UpgradeSkipLocked
        )
    }

    pub fn requires_version_increment(self) -> bool {
        matches!(
            self,
            Self::OptimisticForceIncrement | Self::PessimisticForceIncrement
        )
    }
}

/// Lock timeout in milliseconds; `Some(0)` means "no wait".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockOptions {
    pub mode: LockMode,
    pub timeout: Option<u64>,
}

impl LockOptions {
    pub const NONE: Self = Self {
        mode: LockMode::None,
        timeout: None,
    };

    pub fn new(mode: LockMode) -> Self {
        Self { mode, timeout: None }
    }

    pub fn with_timeout(mut self, millis: u64) -> Self {
        self.timeout = Some(millis);
        self
    }

    pub(crate) fn effective_mode(self) -> LockMode {
        match (self.mode, self.timeout) {
            (LockMode::PessimisticWrite | LockMode::PessimisticForceIncrement, Some(0)) => {
                LockMode::UpgradeNowait
            }
            (mode, _) => mode,
        }
    }
}
