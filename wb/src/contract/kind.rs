//! Message kinds and their fixed topic/field bindings

use serde::{Deserialize, Serialize};

use crate::bus::topic;

/// Field injected into every published payload
pub const TIME_FIELD: &str = "time";

/// Every message kind on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ListDevices,
    DeviceList,
    PairTrainerRider,
    GetPlan,
    ListPlan,
    SetFtp,
    RequestFtp,
    FtpValue,
    StartPlan,
    StopPlan,
    SetTargetPower,
    SetTargetCadence,
    SetMeasuredPower,
    SetMeasuredCadence,
}

/// Which way a message flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Request,
    Response,
    Command,
    Broadcast,
    Telemetry,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Response => write!(f, "response"),
            Self::Command => write!(f, "command"),
            Self::Broadcast => write!(f, "broadcast"),
            Self::Telemetry => write!(f, "telemetry"),
        }
    }
}

impl MessageKind {
    pub const ALL: [MessageKind; 14] = [
        Self::ListDevices,
        Self::DeviceList,
        Self::PairTrainerRider,
        Self::GetPlan,
        Self::ListPlan,
        Self::SetFtp,
        Self::RequestFtp,
        Self::FtpValue,
        Self::StartPlan,
        Self::StopPlan,
        Self::SetTargetPower,
        Self::SetTargetCadence,
        Self::SetMeasuredPower,
        Self::SetMeasuredCadence,
    ];

    /// Last topic level for this kind
    pub fn command(self) -> &'static str {
        match self {
            Self::ListDevices => "list_devices",
            Self::DeviceList => "device_list",
            Self::PairTrainerRider => "pair_trainer_rider",
            Self::GetPlan => "get_plan",
            Self::ListPlan => "list_plan",
            Self::SetFtp => "set_ftp",
            Self::RequestFtp => "request_ftp",
            Self::FtpValue => "ftp_value",
            Self::StartPlan => "start_plan",
            Self::StopPlan => "stop_plan",
            Self::SetTargetPower => "set_target_power",
            Self::SetTargetCadence => "set_target_cadence",
            Self::SetMeasuredPower => "set_measured_power",
            Self::SetMeasuredCadence => "set_measured_cadence",
        }
    }

    /// Exact field set a publisher must supply (excluding `time`)
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::ListDevices | Self::GetPlan | Self::StartPlan | Self::StopPlan => &[],
            Self::DeviceList => &["device_list"],
            Self::PairTrainerRider => &["uuid_trainer", "uuid_rider"],
            Self::ListPlan => &["training_plan"],
            Self::SetFtp | Self::FtpValue => &["uuid_trainer", "ftp"],
            Self::RequestFtp => &["uuid_trainer"],
            Self::SetTargetPower => &["target_power"],
            Self::SetTargetCadence => &["target_cadence"],
            Self::SetMeasuredPower => &["uuid_trainer", "measured_power", "percent_ftp"],
            Self::SetMeasuredCadence => &["uuid_trainer", "measured_cadence"],
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            Self::ListDevices | Self::GetPlan | Self::RequestFtp => Direction::Request,
            Self::DeviceList | Self::ListPlan | Self::FtpValue => Direction::Response,
            Self::PairTrainerRider | Self::SetFtp => Direction::Command,
            Self::StartPlan | Self::StopPlan | Self::SetTargetPower | Self::SetTargetCadence => Direction::Broadcast,
            Self::SetMeasuredPower | Self::SetMeasuredCadence => Direction::Telemetry,
        }
    }

    /// Cadence kinds are only exchanged by cadence-capable agents
    pub fn is_cadence(self) -> bool {
        matches!(self, Self::SetTargetCadence | Self::SetMeasuredCadence)
    }

    /// Full topic under the given namespace
    pub fn topic(self, namespace: &str) -> String {
        topic::join(namespace, self.command())
    }

    pub fn from_command(command: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.command() == command)
    }

    /// Map a concrete topic back to its kind
    ///
    /// Returns None for topics outside the namespace or unknown commands.
    pub fn from_topic(namespace: &str, topic: &str) -> Option<Self> {
        let command = topic.strip_prefix(namespace)?.strip_prefix('/')?;
        Self::from_command(command)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}
