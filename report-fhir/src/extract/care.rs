use report_core::{
    Appointment, AppointmentResponse, CarePlan, ClinicalImpression, FamilyHistory, Flag, Goal,
    NutritionOrder, Questionnaire, ReportIr, RiskAssessment,
};
use serde_json::Value;

use crate::resolve::{
    concept_text, first, first_coding, first_text, join_non_empty, list,
    scalar_text, strip_tags, text, text_at,
};

pub fn care_plan(r: &Value, ir: &mut ReportIr) {
    let activities = list(r.get("activity"))
        .iter()
        .filter_map(|activity| {
            let detail = activity.get("detail")?;
            text(detail.get("description")).or_else(|| concept_text(detail.get("code")))
        })
        .collect();
    ir.care_plans.push(CarePlan {
        title: first_text(r, &["/title", "/description"]).unwrap_or_else(|| "Care Plan".to_string()),
        status: text(r.get("status")),
        start: text_at(r, "/period/start"),
        end: text_at(r, "/period/end"),
        activities,
    });
}

pub fn goal(r: &Value, ir: &mut ReportIr) {
    let target = first(r.get("target"));
    ir.goals.push(Goal {
        description: concept_text(r.get("description")).unwrap_or_else(|| "Goal".to_string()),
        status: first_text(r, &["/lifecycleStatus", "/status"]),
        target: target.and_then(|target| {
            text(target.get("detailString"))
                .or_else(|| scalar_text(target.pointer("/detailQuantity/value")))
        }),
        due: target.and_then(|target| text(target.get("dueDate"))),
    });
}

pub fn family_member_history(r: &Value, ir: &mut ReportIr) {
    let condition = first(r.get("condition"));
    ir.family_history.push(FamilyHistory {
        relation: concept_text(r.get("relationship")),
        condition: condition.and_then(|condition| concept_text(condition.get("code"))),
        onset: condition.and_then(|condition| {
            scalar_text(condition.pointer("/onsetAge/value"))
                .or_else(|| text(condition.get("onsetString")))
        }),
    });
}

pub fn questionnaire_response(r: &Value, ir: &mut ReportIr) {
    let questionnaire = r.get("questionnaire");
    let title = questionnaire
        .and_then(|q| {
            text(q.get("display"))
                .or_else(|| text(q.get("reference")))
                .or_else(|| text(Some(q)))
        })
        .unwrap_or_else(|| "Questionnaire".to_string());

    let parts = list(r.get("item")).iter().filter_map(|item| {
        let answers = list(item.get("answer"))
            .iter()
            .filter_map(|answer| {
                text(answer.get("valueString"))
                    .or_else(|| text(answer.pointer("/valueCoding/display")))
                    .or_else(|| scalar_text(answer.get("valueInteger")))
                    .or_else(|| scalar_text(answer.get("valueDecimal")))
            })
            .collect::<Vec<_>>()
            .join(", ");
        join_non_empty(text(item.get("text")).into_iter().chain(Some(answers)), ": ")
    });

    ir.questionnaires.push(Questionnaire {
        title,
        date: text(r.get("authored")),
        summary: join_non_empty(parts, " | "),
    });
}

pub fn nutrition_order(r: &Value, ir: &mut ReportIr) {
    let diet = join_non_empty(
        list(r.pointer("/oralDiet/type"))
            .iter()
            .filter_map(|kind| concept_text(Some(kind))),
        ", ",
    );
    ir.nutrition_orders.push(NutritionOrder {
        date: text(r.get("dateTime")),
        status: text(r.get("status")),
        diet,
        instruction: concept_text(r.pointer("/oralDiet/instruction"))
            .or_else(|| first(r.get("note")).and_then(|note| text(note.get("text")))),
    });
}

pub fn risk_assessment(r: &Value, ir: &mut ReportIr) {
    let prediction = first(r.get("prediction"));
    let probability = prediction.and_then(|prediction| {
        text(prediction.get("probabilityString")).or_else(|| {
            prediction
                .get("probabilityDecimal")
                .and_then(Value::as_f64)
                .map(|decimal| format!("{}%", (decimal * 100.0).round()))
        })
    });
    ir.risk_assessments.push(RiskAssessment {
        name: concept_text(r.get("code"))
            .or_else(|| concept_text(r.get("condition")))
            .unwrap_or_else(|| "Risk Assessment".to_string()),
        date: first_text(r, &["/occurrenceDateTime", "/occurrencePeriod/start"]),
        summary: strip_tags(r.pointer("/text/div")),
        probability,
    });
}

pub fn clinical_impression(r: &Value, ir: &mut ReportIr) {
    ir.clinical_impressions.push(ClinicalImpression {
        date: first_text(r, &["/date", "/effectiveDateTime", "/effectivePeriod/start"]),
        summary: first_text(r, &["/summary", "/description"])
            .or_else(|| strip_tags(r.pointer("/text/div"))),
        status: text(r.get("status")),
    });
}

pub fn flag(r: &Value, ir: &mut ReportIr) {
    ir.flags.push(Flag {
        status: text(r.get("status")),
        code: first_coding(r.get("code")),
        category: concept_text(first(r.get("category"))),
        period_start: text_at(r, "/period/start"),
        period_end: text_at(r, "/period/end"),
    });
}

pub fn appointment(r: &Value, ir: &mut ReportIr) {
    let participants = list(r.get("participant"));
    let actor_display = |participant: &Value| text_at(participant, "/actor/display");
    let location = participants
        .iter()
        .filter(|participant| {
            text_at(participant, "/actor/reference")
                .is_some_and(|reference| reference.to_ascii_lowercase().contains("location"))
        })
        .find_map(actor_display)
        .or_else(|| participants.iter().find_map(actor_display));

    ir.appointments.push(Appointment {
        start: text(r.get("start")),
        end: text(r.get("end")),
        status: text(r.get("status")),
        kind: concept_text(r.get("appointmentType")),
        reason: concept_text(first(r.get("reasonCode"))),
        location,
    });
}

pub fn appointment_response(r: &Value, ir: &mut ReportIr) {
    ir.appointment_responses.push(AppointmentResponse {
        actor: text_at(r, "/actor/display"),
        start: text(r.get("start")),
        end: text(r.get("end")),
        participant_status: text(r.get("participantStatus")),
    });
}
