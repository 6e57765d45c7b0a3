// File: src/scenario/action.rs
//
// Everything the event clock can fire. Each variant carries its arguments by
// value so nothing scheduled borrows from the topology.

use std::fmt;

use crate::bgp::{Asn, Prefix, Route};
use crate::fault::FaultId;
use crate::speaker::Update;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Advertise {
        speaker: Asn,
        route: Route,
    },
    Receive {
        speaker: Asn,
        from: Asn,
        route: Route,
    },
    ReceiveWithdrawal {
        speaker: Asn,
        from: Asn,
        prefix: Prefix,
    },
    InstallForwarding {
        speaker: Asn,
        prefix: Prefix,
        next_hop: Asn,
        metric: u32,
    },
    Withdraw {
        speaker: Asn,
        prefix: Prefix,
    },
    Fault(FaultId),
    Dump {
        label: String,
    },
}

impl From<Update> for Action {
    fn from(update: Update) -> Self {
        match update {
            Update::Announce { from, to, route } => Action::Receive {
                speaker: to,
                from,
                route,
            },
            Update::Withdraw { from, to, prefix } => Action::ReceiveWithdrawal {
                speaker: to,
                from,
                prefix,
            },
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Advertise { speaker, route } => {
                write!(f, "AS{} advertise {}", speaker, route.prefix)
            }
            Action::Receive {
                speaker,
                from,
                route,
            } => write!(f, "AS{} receive {} from AS{}", speaker, route.prefix, from),
            Action::ReceiveWithdrawal {
                speaker,
                from,
                prefix,
            } => write!(f, "AS{} receive withdrawal of {} from AS{}", speaker, prefix, from),
            Action::InstallForwarding {
                speaker,
                prefix,
                next_hop,
                metric,
            } => write!(
                f,
                "AS{} install {} via AS{} metric {}",
                speaker, prefix, next_hop, metric
            ),
            Action::Withdraw { speaker, prefix } => write!(f, "AS{} withdraw {}", speaker, prefix),
            Action::Fault(id) => write!(f, "fault #{}", id.0),
            Action::Dump { label } => write!(f, "dump '{}'", label),
        }
    }
}
