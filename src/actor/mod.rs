mod client;
mod registry;
mod room;
pub(crate) mod messages;

pub(crate) use messages::{BroadcastToRoom, CreateClient, RoomMemberCount};
pub(crate) use registry::Registry;
