use report_core::{
    Claim, ClaimResponse, Coverage, Eligibility, ExplanationOfBenefit, PaymentNotice,
    PaymentReconciliation, ReportIr,
};
use serde_json::Value;

use crate::resolve::{concept_text, first, first_text, format_money, text, text_at};

pub fn coverage(r: &Value, ir: &mut ReportIr) {
    ir.coverage.push(Coverage {
        payor: first(r.get("payor")).and_then(|payor| text(payor.get("display"))),
        kind: concept_text(r.get("type")),
        status: text(r.get("status")),
        start: text_at(r, "/period/start"),
        end: text_at(r, "/period/end"),
        member_id: first_text(r, &["/subscriberId", "/beneficiary/identifier/value"]),
    });
}

pub fn explanation_of_benefit(r: &Value, ir: &mut ReportIr) {
    ir.eobs.push(ExplanationOfBenefit {
        kind: concept_text(r.get("type")),
        status: text(r.get("status")),
        period_start: text_at(r, "/billablePeriod/start"),
        period_end: text_at(r, "/billablePeriod/end"),
        insurer_paid: format_money(r.pointer("/payment/amount")),
        patient_paid: format_money(r.pointer("/benefitBalance/0/financial/0/usedMoney")),
        claim_id: text_at(r, "/claim/reference"),
    });
}

pub fn claim(r: &Value, ir: &mut ReportIr) {
    ir.claims.push(Claim {
        kind: concept_text(r.get("type")),
        status: text(r.get("status")),
        created: text(r.get("created")),
        provider: text_at(r, "/provider/display"),
    });
}

pub fn claim_response(r: &Value, ir: &mut ReportIr) {
    ir.claim_responses.push(ClaimResponse {
        status: text(r.get("status")),
        outcome: concept_text(r.get("outcome")),
        created: text(r.get("created")),
    });
}

pub fn payment_notice(r: &Value, ir: &mut ReportIr) {
    ir.payment_notices.push(PaymentNotice {
        amount: format_money(r.get("amount")),
        date: text(r.get("created")),
        provider: text_at(r, "/provider/display"),
    });
}

pub fn payment_reconciliation(r: &Value, ir: &mut ReportIr) {
    ir.payment_reconciliations.push(PaymentReconciliation {
        total: format_money(r.get("total")),
        date: text(r.get("created")),
        disposition: text(r.get("disposition")),
    });
}

pub fn eligibility_request(r: &Value, ir: &mut ReportIr) {
    ir.eligibilities.push(Eligibility {
        status: text(r.get("status")),
        outcome: None,
        created: text(r.get("created")),
        service: text(first(r.get("purpose"))),
        period_start: text_at(r, "/servicedPeriod/start"),
        period_end: text_at(r, "/servicedPeriod/end"),
    });
}

pub fn eligibility_response(r: &Value, ir: &mut ReportIr) {
    ir.eligibilities.push(Eligibility {
        status: text(r.get("status")),
        outcome: concept_text(r.get("outcome")),
        created: text(r.get("created")),
        service: text(first(r.get("purpose"))),
        period_start: text_at(r, "/servicedPeriod/start"),
        period_end: text_at(r, "/servicedPeriod/end"),
    });
}
