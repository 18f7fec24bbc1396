//! Side effects returned by the reducer and executed by the runtime.

use buildboard_core::controller::ConnectionEffect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEffect {
    /// Spawn the transport task for `generation`.
    OpenConnection { generation: u64 },
    /// Cancel the transport task for `generation`.
    CloseConnection { generation: u64 },
}

impl From<ConnectionEffect> for UiEffect {
    fn from(effect: ConnectionEffect) -> Self {
        match effect {
            ConnectionEffect::Open { generation } => UiEffect::OpenConnection { generation },
            ConnectionEffect::Close { generation } => UiEffect::CloseConnection { generation },
        }
    }
}

pub(crate) fn from_connection(effects: Vec<ConnectionEffect>) -> Vec<UiEffect> {
    effects.into_iter().map(UiEffect::from).collect()
}
