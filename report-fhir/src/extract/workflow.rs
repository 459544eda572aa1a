use report_core::{
    AuditEvent, CareTeam, Communication, CommunicationRequest, Consent, ReportIr, Task,
};
use serde_json::Value;

use crate::resolve::{concept_text, first, join_non_empty, list, text, text_at};

/// Payload contents joined with `" | "`.
fn payload_summary(r: &Value) -> Option<String> {
    join_non_empty(
        list(r.get("payload")).iter().filter_map(|payload| {
            text(payload.get("contentString"))
                .or_else(|| text_at(payload, "/contentAttachment/title"))
        }),
        " | ",
    )
}

pub fn consent(r: &Value, ir: &mut ReportIr) {
    ir.consents.push(Consent {
        scope: concept_text(r.get("scope")),
        category: concept_text(first(r.get("category"))),
        date: text(r.get("dateTime")),
        performer: first(r.get("performer")).and_then(|performer| text(performer.get("display"))),
    });
}

pub fn audit_event(r: &Value, ir: &mut ReportIr) {
    ir.audit_events.push(AuditEvent {
        kind: concept_text(r.get("type")),
        action: text(r.get("action")),
        date: text(r.get("recorded")),
        outcome: concept_text(r.get("outcome")),
    });
}

pub fn communication(r: &Value, ir: &mut ReportIr) {
    ir.communications.push(Communication {
        sent: text(r.get("sent")),
        received: text(r.get("received")),
        subject: text_at(r, "/subject/display"),
        summary: payload_summary(r),
    });
}

pub fn communication_request(r: &Value, ir: &mut ReportIr) {
    ir.communication_requests.push(CommunicationRequest {
        authored_on: text(r.get("authoredOn")),
        status: text(r.get("status")),
        requester: text_at(r, "/requester/display"),
        summary: payload_summary(r),
    });
}

pub fn care_team(r: &Value, ir: &mut ReportIr) {
    ir.care_teams.push(CareTeam {
        name: text(r.get("name")),
        status: text(r.get("status")),
        period_start: text_at(r, "/period/start"),
        period_end: text_at(r, "/period/end"),
        members: list(r.get("participant"))
            .iter()
            .filter_map(|participant| text_at(participant, "/member/display"))
            .collect(),
    });
}

pub fn task(r: &Value, ir: &mut ReportIr) {
    ir.tasks.push(Task {
        status: text(r.get("status")),
        intent: text(r.get("intent")),
        authored_on: text(r.get("authoredOn")),
        for_display: text_at(r, "/for/display"),
        description: text(r.get("description")),
    });
}
