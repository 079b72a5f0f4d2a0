//! Inspection Pipeline
//!
//! Walks a connected session's service/characteristic/descriptor tree and
//! produces the normalized snapshot shown in the dashboard. Sibling nodes
//! fan out concurrently at every level; descriptor-level failures degrade
//! the affected characteristic to a bare record, while a service- or
//! characteristic-level enumeration failure aborts the whole pass with no
//! partial tree.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future;
use tracing::warn;

use crate::domain::interpreter;
use crate::domain::models::{
    CharacteristicRecord, DescriptorRecord, DescriptorStatus, DeviceSnapshot, ServiceRecord,
};
use crate::domain::uuids::{self, UuidNamespace};
use crate::infrastructure::bluetooth::error::BleError;
use crate::infrastructure::bluetooth::provider::{
    GattCharacteristic, GattDescriptor, GattService, GattSession,
};

/// Live handles for interactive operations, keyed by the record `key`.
/// Kept outside the snapshot so the records stay pure data.
pub type CharacteristicAccessors = HashMap<String, Arc<dyn GattCharacteristic>>;

pub struct InspectionResult {
    pub device: DeviceSnapshot,
    pub services: Vec<ServiceRecord>,
    pub accessors: CharacteristicAccessors,
}

/// Enumerates the full GATT tree of `session`.
pub async fn inspect_device(session: &dyn GattSession) -> Result<InspectionResult, BleError> {
    let device = DeviceSnapshot::new(session.device_name(), session.device_id());

    let services = session.primary_services().await?;
    let inspected =
        future::try_join_all(services.iter().map(|service| inspect_service(service.as_ref())))
            .await?;

    let mut accessors = CharacteristicAccessors::new();
    let services = inspected
        .into_iter()
        .map(|(record, live)| {
            accessors.extend(live);
            record
        })
        .collect();

    Ok(InspectionResult {
        device,
        services,
        accessors,
    })
}

type LiveHandles = Vec<(String, Arc<dyn GattCharacteristic>)>;

async fn inspect_service(
    service: &dyn GattService,
) -> Result<(ServiceRecord, LiveHandles), BleError> {
    let uuid = service.uuid();
    let label = uuids::label_with_name(&uuid, UuidNamespace::Service);

    let characteristics = service.characteristics().await?;
    let inspected = future::join_all(characteristics.iter().enumerate().map(
        |(index, characteristic)| {
            let key = format!("{}:{}#{}", uuid, characteristic.uuid(), index);
            inspect_characteristic(characteristic.clone(), key)
        },
    ))
    .await;

    let mut live = LiveHandles::with_capacity(inspected.len());
    let records = inspected
        .into_iter()
        .map(|(record, accessor)| {
            live.push((record.key.clone(), accessor));
            record
        })
        .collect();

    Ok((
        ServiceRecord {
            uuid,
            label,
            characteristics: records,
        },
        live,
    ))
}

async fn inspect_characteristic(
    characteristic: Arc<dyn GattCharacteristic>,
    key: String,
) -> (CharacteristicRecord, Arc<dyn GattCharacteristic>) {
    let uuid = characteristic.uuid();
    let label = uuids::label_with_name(&uuid, UuidNamespace::Characteristic);
    let properties = characteristic.properties();

    let (descriptors, presentation) = if characteristic.supports_descriptors() {
        match characteristic.descriptors().await {
            Ok(handles) => {
                let records =
                    future::join_all(handles.iter().map(|d| describe_descriptor(d.as_ref())))
                        .await;
                // The first descriptor that produced a summary names the
                // characteristic's value encoding.
                let presentation = records.iter().find_map(|r| r.presentation.clone());
                (records, presentation)
            }
            Err(err) => {
                warn!(%uuid, %err, "descriptor introspection failed");
                (Vec::new(), None)
            }
        }
    } else {
        (Vec::new(), None)
    };

    let record = CharacteristicRecord {
        uuid,
        label,
        key,
        operations: properties.labels().iter().map(|s| s.to_string()).collect(),
        capabilities: properties.capabilities(),
        descriptors,
        presentation,
    };
    (record, characteristic)
}

/// Interprets one descriptor: label always, decoded value for the user
/// description type, summary string for the presentation format type.
/// Read failures degrade to the bare label.
pub(crate) async fn describe_descriptor(descriptor: &dyn GattDescriptor) -> DescriptorRecord {
    let uuid = descriptor.uuid();
    let code = uuids::canonicalize_short(&uuid);
    let label = uuids::label_with_name(&uuid, UuidNamespace::Descriptor);

    let mut record = DescriptorRecord {
        uuid,
        label,
        value: None,
        presentation: None,
        status: DescriptorStatus::Unrecognized,
    };

    if !descriptor.supports_read() {
        record.status = DescriptorStatus::NotReadable;
        return record;
    }

    let value = match descriptor.read().await {
        Ok(value) => value,
        Err(err) => {
            warn!(uuid = %record.uuid, %err, "unable to read descriptor value");
            record.status = DescriptorStatus::ReadFailed;
            return record;
        }
    };

    match code.as_str() {
        interpreter::USER_DESCRIPTION => {
            record.value = Some(interpreter::decode_user_description(&value));
            record.status = DescriptorStatus::Decoded;
        }
        interpreter::PRESENTATION_FORMAT => {
            if let Some(summary) = interpreter::parse_presentation_format(&value) {
                record.presentation = Some(summary);
                record.status = DescriptorStatus::Decoded;
            }
        }
        _ => {}
    }

    record
}
