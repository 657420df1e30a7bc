//! Kind-specific order payloads

use super::types::OrderKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind-specific order data, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderPayload {
    Appointment(AppointmentPayload),
    Prescription(PrescriptionPayload),
    LabOrder(LabOrderPayload),
    InsuranceClaim(InsuranceClaimPayload),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentPayload {
    /// Unix millis
    pub scheduled_at: i64,
    pub provider_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionPayload {
    pub medication: String,
    pub dosage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub refills: u32,
    pub prescriber_user_id: String,
    pub prescriber_name: String,
    pub facility_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabOrderPayload {
    pub test_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_code: Option<String>,
    /// Receiving laboratory tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performing_lab_id: Option<String>,
    pub ordering_physician_user_id: String,
    pub ordering_physician_name: String,
    pub facility_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_indication: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<LabResult>,
}

/// Interpretation flag attached to a lab result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResultFlag {
    #[default]
    Normal,
    Abnormal,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabResult {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,
    #[serde(default)]
    pub flag: ResultFlag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Set by the server when the result is recorded
    #[serde(default)]
    pub recorded_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsuranceClaimPayload {
    /// Receiving insurer tenant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurer_tenant_id: Option<String>,
    pub policy_number: String,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default)]
    pub service_codes: Vec<String>,
    #[serde(default)]
    pub diagnosis_codes: Vec<String>,
    pub facility_name: String,
}

impl OrderPayload {
    pub fn kind(&self) -> OrderKind {
        match self {
            OrderPayload::Appointment(_) => OrderKind::Appointment,
            OrderPayload::Prescription(_) => OrderKind::Prescription,
            OrderPayload::LabOrder(_) => OrderKind::LabOrder,
            OrderPayload::InsuranceClaim(_) => OrderKind::InsuranceClaim,
        }
    }

    /// Tenant named on the order as its receiver, if the kind carries one
    pub fn routing_target(&self) -> Option<&str> {
        match self {
            OrderPayload::LabOrder(p) => p.performing_lab_id.as_deref(),
            OrderPayload::InsuranceClaim(p) => p.insurer_tenant_id.as_deref(),
            _ => None,
        }
    }

    /// Check required fields; returns the offending field name
    pub fn validate(&self) -> Result<(), &'static str> {
        fn required(value: &str, field: &'static str) -> Result<(), &'static str> {
            if value.trim().is_empty() {
                Err(field)
            } else {
                Ok(())
            }
        }

        match self {
            OrderPayload::Appointment(p) => {
                required(&p.provider_name, "provider_name")?;
                if p.scheduled_at <= 0 {
                    return Err("scheduled_at");
                }
            }
            OrderPayload::Prescription(p) => {
                required(&p.medication, "medication")?;
                required(&p.dosage, "dosage")?;
                required(&p.prescriber_user_id, "prescriber_user_id")?;
                required(&p.prescriber_name, "prescriber_name")?;
                required(&p.facility_name, "facility_name")?;
            }
            OrderPayload::LabOrder(p) => {
                required(&p.test_name, "test_name")?;
                required(&p.ordering_physician_user_id, "ordering_physician_user_id")?;
                required(&p.ordering_physician_name, "ordering_physician_name")?;
                required(&p.facility_name, "facility_name")?;
                if p.result.is_some() {
                    return Err("result");
                }
            }
            OrderPayload::InsuranceClaim(p) => {
                required(&p.policy_number, "policy_number")?;
                required(&p.currency, "currency")?;
                required(&p.facility_name, "facility_name")?;
                if p.amount.is_sign_negative() {
                    return Err("amount");
                }
            }
        }
        Ok(())
    }
}
