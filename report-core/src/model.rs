//! Mô hình trung gian (IR) chuẩn hóa cho một hồ sơ bệnh nhân.
//!
//! Mọi trường vắng mặt trong dữ liệu nguồn được giữ là `None`, không bao giờ
//! được gán giá trị mặc định gây hiểu nhầm.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::time::parse_timestamp;

/// Mã hóa lâm sàng (coding đầu tiên của một CodeableConcept).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Code {
    pub system: Option<String>,
    pub code: Option<String>,
    pub display: Option<String>,
}

impl Code {
    /// `None` khi cả ba thành phần đều trống.
    pub fn non_empty(self) -> Option<Self> {
        if self.system.is_none() && self.code.is_none() && self.display.is_none() {
            None
        } else {
            Some(self)
        }
    }
}

/// Định danh nghiệp vụ (MRN, số bảo hiểm...).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Identifier {
    pub system: Option<String>,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Một điểm liên lạc (điện thoại, email) kèm nhãn sử dụng và thứ hạng.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactPoint {
    pub value: String,
    pub use_label: Option<String>,
    pub rank: Option<u32>,
}

/// Thông tin nhân khẩu học. Ghi sau cùng thắng, không trộn giữa nhiều Patient.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Patient {
    pub id: Option<String>,
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    /// Tối đa ba số điện thoại duy nhất, đã sắp theo ưu tiên.
    pub phones: Vec<ContactPoint>,
    /// Số điện thoại ưu tiên.
    pub phone: Option<String>,
    pub emails: Vec<ContactPoint>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub identifiers: Vec<Identifier>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Medication {
    pub name: String,
    pub code: Option<Code>,
    pub status: Option<String>,
    pub dosage: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Condition {
    pub name: String,
    pub code: Option<Code>,
    pub onset: Option<String>,
    pub abatement: Option<String>,
    pub clinical_status: Option<String>,
    pub verification_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Allergy {
    pub name: String,
    pub code: Option<Code>,
    pub reaction: Option<String>,
    pub status: Option<String>,
    pub criticality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Immunization {
    pub name: String,
    pub code: Option<Code>,
    pub date: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Encounter {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<Code>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Procedure {
    pub name: String,
    pub code: Option<Code>,
    pub date: Option<String>,
    pub performer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Device {
    pub name: String,
    pub code: Option<Code>,
    pub status: Option<String>,
    pub udi: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Document {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: Option<Code>,
    pub date: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DiagnosticReport {
    pub name: String,
    pub code: Option<Code>,
    pub date: Option<String>,
    pub result_refs: Vec<String>,
}

/// Một điểm dữ liệu số trong chuỗi thời gian.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SeriesPoint {
    /// Thời điểm ghi nhận, giữ nguyên chuỗi nguồn.
    pub t: Option<String>,
    /// Luôn hữu hạn.
    pub v: f64,
    pub unit: Option<String>,
}

/// Chuỗi thời gian xét nghiệm hoặc chỉ số sống, nhóm theo tên hiển thị.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Panel {
    pub name: String,
    pub code: Option<Code>,
    pub points: Vec<SeriesPoint>,
}

impl Panel {
    pub fn new(name: impl Into<String>, code: Option<Code>) -> Self {
        Self {
            name: name.into(),
            code,
            points: Vec::new(),
        }
    }

    /// Sắp các điểm tăng dần theo thời gian (sắp xếp ổn định).
    ///
    /// Điểm không có hoặc không đọc được thời gian đứng đầu, giữ thứ tự chèn.
    pub fn sort_points(&mut self) {
        self.points
            .sort_by_cached_key(|point| point.t.as_deref().and_then(parse_timestamp));
    }

    /// Khóa nhóm: tên đã cắt khoảng trắng, gộp khoảng trắng và viết thường.
    pub fn grouping_key(name: &str) -> String {
        name.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CarePlan {
    pub title: String,
    pub status: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Goal {
    pub description: String,
    pub status: Option<String>,
    pub target: Option<String>,
    pub due: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct FamilyHistory {
    pub relation: Option<String>,
    pub condition: Option<String>,
    pub onset: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Questionnaire {
    pub title: String,
    pub date: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Coverage {
    pub payor: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub member_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ImagingStudy {
    pub modality: Option<String>,
    pub body_site: Option<String>,
    pub started: Option<String>,
    pub description: Option<String>,
    pub series: Option<u64>,
    pub instances: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceRequest {
    pub name: String,
    pub code: Option<Code>,
    pub date: Option<String>,
    pub status: Option<String>,
    pub requester: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Appointment {
    pub start: Option<String>,
    pub end: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Organization {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub telecom: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Practitioner {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub telecom: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PractitionerRole {
    pub practitioner: Option<String>,
    pub organization: Option<String>,
    pub specialty: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Location {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub address: Option<String>,
    pub telecom: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RelatedPerson {
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub telecom: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RiskAssessment {
    pub name: String,
    pub date: Option<String>,
    pub summary: Option<String>,
    pub probability: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MedicationAdministration {
    pub date: Option<String>,
    pub medication: Option<String>,
    pub dose: Option<String>,
    pub route: Option<String>,
    pub performer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MedicationDispense {
    pub date: Option<String>,
    pub medication: Option<String>,
    pub quantity: Option<String>,
    pub days_supply: Option<String>,
    pub performer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ClinicalImpression {
    pub date: Option<String>,
    pub summary: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Flag {
    pub status: Option<String>,
    pub code: Option<Code>,
    pub category: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
}

// Tài chính

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExplanationOfBenefit {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub insurer_paid: Option<String>,
    pub patient_paid: Option<String>,
    pub claim_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Claim {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub created: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ClaimResponse {
    pub status: Option<String>,
    pub outcome: Option<String>,
    pub created: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentNotice {
    pub amount: Option<String>,
    pub date: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentReconciliation {
    pub total: Option<String>,
    pub date: Option<String>,
    pub disposition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Eligibility {
    pub status: Option<String>,
    pub outcome: Option<String>,
    pub created: Option<String>,
    pub service: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
}

// Quyền riêng tư và luồng công việc

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Consent {
    pub scope: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub performer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AuditEvent {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub action: Option<String>,
    pub date: Option<String>,
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Communication {
    pub sent: Option<String>,
    pub received: Option<String>,
    pub subject: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CommunicationRequest {
    pub authored_on: Option<String>,
    pub status: Option<String>,
    pub requester: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CareTeam {
    pub name: Option<String>,
    pub status: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Task {
    pub status: Option<String>,
    pub intent: Option<String>,
    pub authored_on: Option<String>,
    #[serde(rename = "for")]
    pub for_display: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppointmentResponse {
    pub actor: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub participant_status: Option<String>,
}

// Lối sống và y lệnh

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SocialHistory {
    pub name: String,
    pub value: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct NutritionOrder {
    pub date: Option<String>,
    pub status: Option<String>,
    pub diet: Option<String>,
    pub instruction: Option<String>,
}

/// Thống kê số lần xuất hiện theo loại resource, dùng cho báo cáo độ phủ.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct OtherSummary {
    pub fhir_counts: BTreeMap<String, usize>,
    /// Chỉ có ở nhánh CCDA/legacy: độ dài mảng thô theo từng khóa.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ccda_counts: Option<BTreeMap<String, usize>>,
}

/// Dữ liệu thô không được trích xuất, giữ lại để kiểm tra độ phủ.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RawOverflow {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fhir: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ccda: Option<Value>,
}

/// IR chuẩn: một bản ghi cho mỗi bệnh nhân.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportIr {
    pub patient: Patient,
    pub medications: Vec<Medication>,
    pub conditions: Vec<Condition>,
    pub allergies: Vec<Allergy>,
    pub immunizations: Vec<Immunization>,
    pub encounters: Vec<Encounter>,
    pub procedures: Vec<Procedure>,
    pub devices: Vec<Device>,
    pub documents: Vec<Document>,
    pub reports: Vec<DiagnosticReport>,
    pub labs: Vec<Panel>,
    pub vitals: Vec<Panel>,
    pub care_plans: Vec<CarePlan>,
    pub goals: Vec<Goal>,
    pub family_history: Vec<FamilyHistory>,
    pub questionnaires: Vec<Questionnaire>,
    pub coverage: Vec<Coverage>,
    pub imaging: Vec<ImagingStudy>,
    pub service_requests: Vec<ServiceRequest>,
    pub appointments: Vec<Appointment>,
    pub organizations: Vec<Organization>,
    pub practitioners: Vec<Practitioner>,
    pub practitioner_roles: Vec<PractitionerRole>,
    pub locations: Vec<Location>,
    pub related_persons: Vec<RelatedPerson>,
    pub risk_assessments: Vec<RiskAssessment>,
    pub other: OtherSummary,
    pub eobs: Vec<ExplanationOfBenefit>,
    pub claims: Vec<Claim>,
    pub claim_responses: Vec<ClaimResponse>,
    pub payment_notices: Vec<PaymentNotice>,
    pub payment_reconciliations: Vec<PaymentReconciliation>,
    pub eligibilities: Vec<Eligibility>,
    pub consents: Vec<Consent>,
    pub audit_events: Vec<AuditEvent>,
    pub communications: Vec<Communication>,
    pub communication_requests: Vec<CommunicationRequest>,
    pub care_teams: Vec<CareTeam>,
    pub tasks: Vec<Task>,
    pub appointment_responses: Vec<AppointmentResponse>,
    pub med_administrations: Vec<MedicationAdministration>,
    pub med_dispenses: Vec<MedicationDispense>,
    pub clinical_impressions: Vec<ClinicalImpression>,
    pub flags: Vec<Flag>,
    pub social_history: Vec<SocialHistory>,
    pub nutrition_orders: Vec<NutritionOrder>,
    #[serde(rename = "_raw", skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawOverflow>,
}

impl ReportIr {
    /// IR rỗng, mọi danh mục đã khởi tạo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tăng bộ đếm cho một loại resource FHIR.
    pub fn count_resource(&mut self, resource_type: &str) {
        *self
            .other
            .fhir_counts
            .entry(resource_type.to_string())
            .or_insert(0) += 1;
    }

    /// Đưa resource không có bộ trích xuất vào vùng dữ liệu thô.
    pub fn push_raw_fhir(&mut self, resource: Value) {
        self.raw.get_or_insert_with(RawOverflow::default).fhir.push(resource);
    }

    /// Thêm một điểm vào panel xét nghiệm theo tên hiển thị.
    pub fn push_lab_point(&mut self, name: &str, code: Option<Code>, point: SeriesPoint) {
        push_panel_point(&mut self.labs, name, code, point);
    }

    /// Thêm một điểm vào panel chỉ số sống theo tên hiển thị.
    pub fn push_vital_point(&mut self, name: &str, code: Option<Code>, point: SeriesPoint) {
        push_panel_point(&mut self.vitals, name, code, point);
    }

    /// Sắp xếp lại toàn bộ panel theo thời gian.
    pub fn sort_panels(&mut self) {
        self.labs.iter_mut().for_each(Panel::sort_points);
        self.vitals.iter_mut().for_each(Panel::sort_points);
    }
}

fn push_panel_point(panels: &mut Vec<Panel>, name: &str, code: Option<Code>, point: SeriesPoint) {
    let key = Panel::grouping_key(name);
    match panels
        .iter_mut()
        .find(|panel| Panel::grouping_key(&panel.name) == key)
    {
        Some(panel) => panel.points.push(point),
        None => {
            let mut panel = Panel::new(name, code);
            panel.points.push(point);
            panels.push(panel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(t: Option<&str>, v: f64) -> SeriesPoint {
        SeriesPoint {
            t: t.map(str::to_string),
            v,
            unit: None,
        }
    }

    #[test]
    fn panels_group_by_normalized_name() {
        let mut ir = ReportIr::new();
        ir.push_vital_point("Heart rate", None, point(Some("2024-01-02"), 70.0));
        ir.push_vital_point("  heart   RATE ", None, point(Some("2024-01-01"), 68.0));
        ir.push_vital_point("Body weight", None, point(Some("2024-01-01"), 80.0));

        assert_eq!(ir.vitals.len(), 2);
        assert_eq!(ir.vitals[0].name, "Heart rate");
        assert_eq!(ir.vitals[0].points.len(), 2);
    }

    #[test]
    fn sort_is_stable_and_chronological() {
        let mut panel = Panel::new("Glucose", None);
        panel.points = vec![
            point(Some("2024-03-01T10:00:00Z"), 3.0),
            point(Some("2024-01-01"), 1.0),
            point(Some("2024-03-01T10:00:00+00:00"), 4.0),
            point(None, 0.5),
            point(Some("2024-02-01T08:00:00Z"), 2.0),
        ];
        panel.sort_points();

        let values: Vec<f64> = panel.points.iter().map(|p| p.v).collect();
        assert_eq!(values, vec![0.5, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn raw_bucket_is_omitted_until_used() {
        let mut ir = ReportIr::new();
        let value = serde_json::to_value(&ir).expect("Không serialize được IR");
        assert!(value.get("_raw").is_none());

        ir.push_raw_fhir(serde_json::json!({"resourceType": "Basic"}));
        let value = serde_json::to_value(&ir).expect("Không serialize được IR");
        assert_eq!(value["_raw"]["fhir"][0]["resourceType"], "Basic");
    }

    #[test]
    fn counts_serialize_as_camel_case() {
        let mut ir = ReportIr::new();
        ir.count_resource("Observation");
        ir.count_resource("Observation");
        let value = serde_json::to_value(&ir).expect("Không serialize được IR");
        assert_eq!(value["other"]["fhirCounts"]["Observation"], 2);
        assert!(value["other"].get("ccdaCounts").is_none());
        assert!(value["medAdministrations"].as_array().is_some());
    }
}
