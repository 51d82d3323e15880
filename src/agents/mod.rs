//! Agent Registry (spec §4.J) and Agent Communication Bus (spec §4.K).

mod bus;
mod registry;

pub use bus::{AgentBus, MailboxHandle};
pub use registry::{AgentFilter, AgentRegistry, TaskProfile};
