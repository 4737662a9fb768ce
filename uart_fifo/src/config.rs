/// Number of in-flight bytes the shared slab holds, across every endpoint and direction.
pub const SLAB_CAPACITY: usize = 512;

/// What an endpoint does when the slab runs dry or the device refuses a byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Treat the fault as a sizing bug and panic.
    Halt,
    /// Drop incoming bytes on exhaustion, requeue bytes the device refused,
    /// and report exhaustion to `send` callers.
    #[default]
    Recover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    pub fault_policy: FaultPolicy,
    /// Maximum number of elements the inbound queue may hold.
    pub rx_limit: Option<usize>,
    /// Maximum number of elements the outbound queue may hold.
    pub tx_limit: Option<usize>,
}

impl EndpointConfig {
    /// Shared slab, no per-direction limits, recoverable faults.
    pub const fn new() -> Self {
        Self {
            fault_policy: FaultPolicy::Recover,
            rx_limit: None,
            tx_limit: None,
        }
    }

    /// Shared slab, no per-direction limits, and every fault halts.
    pub const fn halting() -> Self {
        Self::new().with_fault_policy(FaultPolicy::Halt)
    }

    pub const fn with_fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    /// Caps the inbound queue, so a flood of received bytes can't drain the
    /// slab other endpoints allocate from.
    pub const fn with_rx_limit(mut self, limit: usize) -> Self {
        self.rx_limit = Some(limit);
        self
    }

    /// Caps the outbound queue.
    pub const fn with_tx_limit(mut self, limit: usize) -> Self {
        self.tx_limit = Some(limit);
        self
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new()
    }
}
