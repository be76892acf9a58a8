//! Device and service description documents.
//!
//! The device description lists the three services with the same URNs and
//! paths the control gateway and SSDP use. Each service control protocol
//! description (SCPD) is rendered from a static action/state-variable table.

use crate::protocol_constants::{MEDIA_RENDERER_DEVICE_TYPE, UPNP_DEVICE_NAMESPACE, UPNP_SERVICE_NAMESPACE};
use crate::state::DeviceConfig;
use crate::upnp::utils::escape_xml;
use crate::upnp::UpnpService;

// ─────────────────────────────────────────────────────────────────────────────
// Tables
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    In,
    Out,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

#[derive(Debug)]
struct ArgumentSpec {
    name: &'static str,
    direction: Direction,
    related: &'static str,
}

const fn input(name: &'static str, related: &'static str) -> ArgumentSpec {
    ArgumentSpec {
        name,
        direction: Direction::In,
        related,
    }
}

const fn output(name: &'static str, related: &'static str) -> ArgumentSpec {
    ArgumentSpec {
        name,
        direction: Direction::Out,
        related,
    }
}

#[derive(Debug)]
struct ActionSpec {
    name: &'static str,
    arguments: &'static [ArgumentSpec],
}

#[derive(Debug)]
struct StateVariableSpec {
    name: &'static str,
    data_type: &'static str,
    send_events: bool,
    allowed: &'static [&'static str],
    /// Inclusive `(minimum, maximum, step)`.
    range: Option<(i64, i64, i64)>,
}

const fn var(name: &'static str, data_type: &'static str) -> StateVariableSpec {
    StateVariableSpec {
        name,
        data_type,
        send_events: false,
        allowed: &[],
        range: None,
    }
}

const fn enumerated(name: &'static str, allowed: &'static [&'static str]) -> StateVariableSpec {
    StateVariableSpec {
        name,
        data_type: "string",
        send_events: false,
        allowed,
        range: None,
    }
}

const fn evented(name: &'static str) -> StateVariableSpec {
    StateVariableSpec {
        name,
        data_type: "string",
        send_events: true,
        allowed: &[],
        range: None,
    }
}

const INSTANCE: ArgumentSpec = input("InstanceID", "A_ARG_TYPE_InstanceID");
const CHANNEL: ArgumentSpec = input("Channel", "A_ARG_TYPE_Channel");

const AV_TRANSPORT_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "SetAVTransportURI",
        arguments: &[
            INSTANCE,
            input("CurrentURI", "AVTransportURI"),
            input("CurrentURIMetaData", "AVTransportURIMetaData"),
        ],
    },
    ActionSpec {
        name: "Play",
        arguments: &[INSTANCE, input("Speed", "TransportPlaySpeed")],
    },
    ActionSpec {
        name: "Pause",
        arguments: &[INSTANCE],
    },
    ActionSpec {
        name: "Stop",
        arguments: &[INSTANCE],
    },
    ActionSpec {
        name: "Seek",
        arguments: &[
            INSTANCE,
            input("Unit", "A_ARG_TYPE_SeekMode"),
            input("Target", "A_ARG_TYPE_SeekTarget"),
        ],
    },
    ActionSpec {
        name: "GetTransportInfo",
        arguments: &[
            INSTANCE,
            output("CurrentTransportState", "TransportState"),
            output("CurrentTransportStatus", "TransportStatus"),
            output("CurrentSpeed", "TransportPlaySpeed"),
        ],
    },
    ActionSpec {
        name: "GetPositionInfo",
        arguments: &[
            INSTANCE,
            output("Track", "CurrentTrack"),
            output("TrackDuration", "CurrentTrackDuration"),
            output("TrackMetaData", "CurrentTrackMetaData"),
            output("TrackURI", "CurrentTrackURI"),
            output("RelTime", "RelativeTimePosition"),
            output("AbsTime", "AbsoluteTimePosition"),
            output("RelCount", "RelativeCounterPosition"),
            output("AbsCount", "AbsoluteCounterPosition"),
        ],
    },
    ActionSpec {
        name: "GetMediaInfo",
        arguments: &[
            INSTANCE,
            output("NrTracks", "NumberOfTracks"),
            output("MediaDuration", "CurrentMediaDuration"),
            output("CurrentURI", "AVTransportURI"),
            output("CurrentURIMetaData", "AVTransportURIMetaData"),
            output("NextURI", "NextAVTransportURI"),
            output("NextURIMetaData", "NextAVTransportURIMetaData"),
            output("PlayMedium", "PlaybackStorageMedium"),
            output("RecordMedium", "RecordStorageMedium"),
            output("WriteStatus", "RecordMediumWriteStatus"),
        ],
    },
    ActionSpec {
        name: "GetDeviceCapabilities",
        arguments: &[
            INSTANCE,
            output("PlayMedia", "PossiblePlaybackStorageMedia"),
            output("RecMedia", "PossibleRecordStorageMedia"),
            output("RecQualityModes", "PossibleRecordQualityModes"),
        ],
    },
    ActionSpec {
        name: "GetTransportSettings",
        arguments: &[
            INSTANCE,
            output("PlayMode", "CurrentPlayMode"),
            output("RecQualityMode", "CurrentRecordQualityMode"),
        ],
    },
    ActionSpec {
        name: "GetCurrentTransportActions",
        arguments: &[INSTANCE, output("Actions", "CurrentTransportActions")],
    },
];

const AV_TRANSPORT_VARIABLES: &[StateVariableSpec] = &[
    evented("LastChange"),
    enumerated(
        "TransportState",
        &["STOPPED", "PLAYING", "TRANSITIONING", "PAUSED_PLAYBACK", "NO_MEDIA_PRESENT"],
    ),
    enumerated("TransportStatus", &["OK", "ERROR_OCCURRED"]),
    enumerated("TransportPlaySpeed", &["1"]),
    var("AVTransportURI", "string"),
    var("AVTransportURIMetaData", "string"),
    var("NextAVTransportURI", "string"),
    var("NextAVTransportURIMetaData", "string"),
    var("NumberOfTracks", "ui4"),
    var("CurrentMediaDuration", "string"),
    var("CurrentTrack", "ui4"),
    var("CurrentTrackDuration", "string"),
    var("CurrentTrackMetaData", "string"),
    var("CurrentTrackURI", "string"),
    var("RelativeTimePosition", "string"),
    var("AbsoluteTimePosition", "string"),
    var("RelativeCounterPosition", "i4"),
    var("AbsoluteCounterPosition", "i4"),
    enumerated("PlaybackStorageMedium", &["NONE", "NETWORK"]),
    enumerated("RecordStorageMedium", &["NOT_IMPLEMENTED"]),
    enumerated("RecordMediumWriteStatus", &["NOT_IMPLEMENTED"]),
    var("PossiblePlaybackStorageMedia", "string"),
    var("PossibleRecordStorageMedia", "string"),
    var("PossibleRecordQualityModes", "string"),
    enumerated("CurrentPlayMode", &["NORMAL"]),
    enumerated("CurrentRecordQualityMode", &["NOT_IMPLEMENTED"]),
    var("CurrentTransportActions", "string"),
    enumerated("A_ARG_TYPE_SeekMode", &["ABS_TIME", "REL_TIME"]),
    var("A_ARG_TYPE_SeekTarget", "string"),
    var("A_ARG_TYPE_InstanceID", "ui4"),
];

const RENDERING_CONTROL_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "GetVolume",
        arguments: &[INSTANCE, CHANNEL, output("CurrentVolume", "Volume")],
    },
    ActionSpec {
        name: "SetVolume",
        arguments: &[INSTANCE, CHANNEL, input("DesiredVolume", "Volume")],
    },
    ActionSpec {
        name: "GetMute",
        arguments: &[INSTANCE, CHANNEL, output("CurrentMute", "Mute")],
    },
    ActionSpec {
        name: "SetMute",
        arguments: &[INSTANCE, CHANNEL, input("DesiredMute", "Mute")],
    },
];

const RENDERING_CONTROL_VARIABLES: &[StateVariableSpec] = &[
    evented("LastChange"),
    StateVariableSpec {
        name: "Volume",
        data_type: "ui2",
        send_events: false,
        allowed: &[],
        range: Some((0, 100, 1)),
    },
    var("Mute", "boolean"),
    enumerated("A_ARG_TYPE_Channel", &["Master"]),
    var("A_ARG_TYPE_InstanceID", "ui4"),
];

const CONNECTION_MANAGER_ACTIONS: &[ActionSpec] = &[
    ActionSpec {
        name: "GetProtocolInfo",
        arguments: &[
            output("Source", "SourceProtocolInfo"),
            output("Sink", "SinkProtocolInfo"),
        ],
    },
    ActionSpec {
        name: "GetCurrentConnectionIDs",
        arguments: &[output("ConnectionIDs", "CurrentConnectionIDs")],
    },
    ActionSpec {
        name: "GetCurrentConnectionInfo",
        arguments: &[
            input("ConnectionID", "A_ARG_TYPE_ConnectionID"),
            output("RcsID", "A_ARG_TYPE_RcsID"),
            output("AVTransportID", "A_ARG_TYPE_AVTransportID"),
            output("ProtocolInfo", "A_ARG_TYPE_ProtocolInfo"),
            output("PeerConnectionManager", "A_ARG_TYPE_ConnectionManager"),
            output("PeerConnectionID", "A_ARG_TYPE_ConnectionID"),
            output("Direction", "A_ARG_TYPE_Direction"),
            output("Status", "A_ARG_TYPE_ConnectionStatus"),
        ],
    },
];

const CONNECTION_MANAGER_VARIABLES: &[StateVariableSpec] = &[
    evented("SourceProtocolInfo"),
    evented("SinkProtocolInfo"),
    evented("CurrentConnectionIDs"),
    enumerated(
        "A_ARG_TYPE_ConnectionStatus",
        &[
            "OK",
            "ContentFormatMismatch",
            "InsufficientBandwidth",
            "UnreliableChannel",
            "Unknown",
        ],
    ),
    var("A_ARG_TYPE_ConnectionManager", "string"),
    enumerated("A_ARG_TYPE_Direction", &["Input", "Output"]),
    var("A_ARG_TYPE_ProtocolInfo", "string"),
    var("A_ARG_TYPE_ConnectionID", "i4"),
    var("A_ARG_TYPE_AVTransportID", "i4"),
    var("A_ARG_TYPE_RcsID", "i4"),
];

fn tables(service: UpnpService) -> (&'static [ActionSpec], &'static [StateVariableSpec]) {
    match service {
        UpnpService::AVTransport => (AV_TRANSPORT_ACTIONS, AV_TRANSPORT_VARIABLES),
        UpnpService::RenderingControl => (RENDERING_CONTROL_ACTIONS, RENDERING_CONTROL_VARIABLES),
        UpnpService::ConnectionManager => (CONNECTION_MANAGER_ACTIONS, CONNECTION_MANAGER_VARIABLES),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

/// Renders the root device description (`/description.xml`).
#[must_use]
pub fn device_description(device: &DeviceConfig) -> String {
    let services: String = UpnpService::ALL
        .iter()
        .map(|service| {
            format!(
                "      <service>\n\
                 \x20       <serviceType>{}</serviceType>\n\
                 \x20       <serviceId>{}</serviceId>\n\
                 \x20       <SCPDURL>{}</SCPDURL>\n\
                 \x20       <controlURL>{}</controlURL>\n\
                 \x20       <eventSubURL>{}</eventSubURL>\n\
                 \x20     </service>\n",
                service.urn(),
                service.service_id(),
                service.scpd_path(),
                service.control_path(),
                service.event_path()
            )
        })
        .collect();

    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <root xmlns=\"{ns}\" xmlns:dlna=\"urn:schemas-dlna-org:device-1-0\">\n\
         \x20 <specVersion>\n\
         \x20   <major>1</major>\n\
         \x20   <minor>0</minor>\n\
         \x20 </specVersion>\n\
         \x20 <device>\n\
         \x20   <deviceType>{device_type}</deviceType>\n\
         \x20   <friendlyName>{name}</friendlyName>\n\
         \x20   <manufacturer>{manufacturer}</manufacturer>\n\
         \x20   <modelDescription>DLNA/UPnP audio renderer</modelDescription>\n\
         \x20   <modelName>{model_name}</modelName>\n\
         \x20   <modelNumber>{model_number}</modelNumber>\n\
         \x20   <serialNumber>{serial}</serialNumber>\n\
         \x20   <UDN>uuid:{uuid}</UDN>\n\
         \x20   <dlna:X_DLNADOC>DMR-1.50</dlna:X_DLNADOC>\n\
         \x20   <serviceList>\n\
         {services}\
         \x20   </serviceList>\n\
         \x20 </device>\n\
         </root>\n",
        ns = UPNP_DEVICE_NAMESPACE,
        device_type = MEDIA_RENDERER_DEVICE_TYPE,
        name = escape_xml(&device.name),
        manufacturer = escape_xml(&device.manufacturer),
        model_name = escape_xml(&device.model_name),
        model_number = escape_xml(&device.model_number),
        serial = escape_xml(&device.serial_number),
        uuid = escape_xml(&device.uuid),
        services = services,
    )
}

/// Renders the service control protocol description for `service`.
#[must_use]
pub fn scpd(service: UpnpService) -> String {
    let (actions, variables) = tables(service);

    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <scpd xmlns=\"{}\">\n\
         \x20 <specVersion>\n\
         \x20   <major>1</major>\n\
         \x20   <minor>0</minor>\n\
         \x20 </specVersion>\n\
         \x20 <actionList>\n",
        UPNP_SERVICE_NAMESPACE
    );

    for action in actions {
        xml.push_str("    <action>\n");
        xml.push_str(&format!("      <name>{}</name>\n", action.name));
        if !action.arguments.is_empty() {
            xml.push_str("      <argumentList>\n");
            for arg in action.arguments {
                xml.push_str(&format!(
                    "        <argument>\n\
                     \x20         <name>{}</name>\n\
                     \x20         <direction>{}</direction>\n\
                     \x20         <relatedStateVariable>{}</relatedStateVariable>\n\
                     \x20       </argument>\n",
                    arg.name,
                    arg.direction.as_str(),
                    arg.related
                ));
            }
            xml.push_str("      </argumentList>\n");
        }
        xml.push_str("    </action>\n");
    }

    xml.push_str("  </actionList>\n  <serviceStateTable>\n");

    for variable in variables {
        let send_events = if variable.send_events { "yes" } else { "no" };
        xml.push_str(&format!(
            "    <stateVariable sendEvents=\"{}\">\n\
             \x20     <name>{}</name>\n\
             \x20     <dataType>{}</dataType>\n",
            send_events, variable.name, variable.data_type
        ));
        if !variable.allowed.is_empty() {
            xml.push_str("      <allowedValueList>\n");
            for value in variable.allowed {
                xml.push_str(&format!("        <allowedValue>{}</allowedValue>\n", value));
            }
            xml.push_str("      </allowedValueList>\n");
        }
        if let Some((minimum, maximum, step)) = variable.range {
            xml.push_str(&format!(
                "      <allowedValueRange>\n\
                 \x20       <minimum>{}</minimum>\n\
                 \x20       <maximum>{}</maximum>\n\
                 \x20       <step>{}</step>\n\
                 \x20     </allowedValueRange>\n",
                minimum, maximum, step
            ));
        }
        xml.push_str("    </stateVariable>\n");
    }

    xml.push_str("  </serviceStateTable>\n</scpd>\n");
    xml
}
