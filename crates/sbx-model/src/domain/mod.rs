mod identity;
pub use identity::{SandboxIdentity, WorkloadIdentity};

mod role;
pub use role::InstanceRole;

mod delivery;
pub use delivery::DeliveryMode;

mod constants;
pub use constants::*;
