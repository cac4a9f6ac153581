use anyhow::{bail, Result};
use ccc_core::action::TriggerOutcome;
use ccc_core::diagnostics::describe;
use ccc_core::pipeline::PipelineOutcome;
use ccc_core::recommend::RecommendOutcome;
use ccc_core::regret::RegretOutcome;
use ccc_core::view::{Reachability, ViewState};
use ccc_core::{Coordinator, CustomerId, Intent, IntentOutcome};
use ccc_events::Bus;
use serde::Serialize;
use serde_json::json;

use super::PlanArgs;
use crate::GlobalArgs;

#[derive(Serialize)]
struct Report<'a> {
    outcome: &'a IntentOutcome,
    view: &'a ViewState,
}

async fn open(global: &GlobalArgs) -> Result<Coordinator> {
    let config = global.client_config()?;
    global.coordinator(config, Bus::default()).await
}

fn print_json(outcome: &IntentOutcome, view: &ViewState) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&Report { outcome, view })?
    );
    Ok(())
}

fn print_analysis(view: &ViewState) {
    if let Some(selected) = view.selected.as_ref() {
        println!("{}", selected.headline());
    }
    if !view.importance.is_empty() {
        println!("Top drivers:");
        for f in &view.importance {
            println!("  {:<28} {:.3}", f.feature, f.importance);
        }
    }
    println!(
        "Simulation: usage drop {:.0}% | tickets {:.0} -> {}",
        view.overrides.usage_drop_pct,
        view.overrides.tickets_30d,
        view.gauge.label()
    );
}

async fn analyze_into(coord: &Coordinator, customer_id: u64) -> Result<IntentOutcome> {
    let outcome = coord
        .handle(Intent::Analyze {
            customer_id: CustomerId(customer_id),
        })
        .await;
    match &outcome {
        IntentOutcome::Analysis(PipelineOutcome::Applied { .. }) => Ok(outcome),
        IntentOutcome::Analysis(PipelineOutcome::Failed { reason, .. }) => bail!("{reason}"),
        IntentOutcome::Rejected(reason) => bail!("{reason}"),
        other => bail!("analysis did not complete: {other:?}"),
    }
}

pub async fn analyze(global: &GlobalArgs, customer_id: u64, plan: &PlanArgs) -> Result<()> {
    let coord = open(global).await?;
    plan.apply(&coord).await?;
    let outcome = analyze_into(&coord, customer_id).await?;
    let view = coord.view();
    if plan.json {
        print_json(&outcome, &view)?;
    } else {
        print_analysis(&view);
        println!("{}", view.status.message);
    }
    Ok(())
}

fn print_regret(view: &ViewState) {
    let rows = view.regret.rows();
    if rows.is_empty() {
        println!("No data available.");
        return;
    }
    println!("{:<10} {:>9} {:>12} {:>12}", "customer", "base", "with action", "improvement");
    for row in rows {
        let marker = if row.counterfactual_is_high() { "!" } else { " " };
        println!(
            "#{:<9} {:>8.1}% {:>10.1}%{} {:>11.1}%",
            row.customer_id,
            row.churn_risk_base * 100.0,
            row.churn_risk_counterfactual * 100.0,
            marker,
            row.improvement_pct()
        );
    }
}

pub async fn regret(global: &GlobalArgs, plan: &PlanArgs) -> Result<()> {
    let coord = open(global).await?;
    plan.apply(&coord).await?;
    let outcome = coord.handle(Intent::RefreshRegret).await;
    let view = coord.view();
    if let IntentOutcome::Regret(RegretOutcome::Failed(detail)) = &outcome {
        bail!("Failed: {detail}");
    }
    if plan.json {
        print_json(&outcome, &view)?;
    } else {
        print_regret(&view);
    }
    Ok(())
}

pub async fn recommend(global: &GlobalArgs, customer_id: u64, json_out: bool) -> Result<()> {
    let coord = open(global).await?;
    analyze_into(&coord, customer_id).await?;
    let outcome = coord.handle(Intent::Recommend).await;
    let view = coord.view();
    if json_out {
        return print_json(&outcome, &view);
    }
    match &outcome {
        IntentOutcome::Recommendation(RecommendOutcome::Applied(rec)) => {
            println!("{}", rec.summary());
            println!(
                "Plan is now {} at day {}",
                view.plan.action_type, view.plan.timing_days
            );
        }
        IntentOutcome::Recommendation(RecommendOutcome::Failed(detail)) => {
            bail!("AI optimization failed: {detail}")
        }
        _ => println!("{}", view.status.message),
    }
    Ok(())
}

pub async fn trigger(global: &GlobalArgs, plan: &PlanArgs) -> Result<()> {
    let coord = open(global).await?;
    plan.apply(&coord).await?;
    if let IntentOutcome::Regret(RegretOutcome::Failed(detail)) =
        coord.handle(Intent::RefreshRegret).await
    {
        bail!("Failed: {detail}");
    }
    let outcome = coord.handle(Intent::TriggerAction).await;
    let view = coord.view();
    if plan.json {
        return print_json(&outcome, &view);
    }
    println!("{}", view.status.message);
    match outcome {
        IntentOutcome::Trigger(TriggerOutcome::Failed(detail)) => bail!("{detail}"),
        _ => Ok(()),
    }
}

pub async fn ping(global: &GlobalArgs, json_out: bool) -> Result<()> {
    let coord = open(global).await?;
    let outcome = coord.handle(Intent::Probe).await;
    let IntentOutcome::Probe(reach) = outcome else {
        bail!("unexpected outcome {outcome:?}");
    };
    if json_out {
        println!("{}", serde_json::to_string_pretty(&reach)?);
    } else {
        println!("{}", describe(&reach));
    }
    match reach {
        Reachability::Reachable { .. } => Ok(()),
        _ => bail!("backend unreachable"),
    }
}

pub async fn customers(global: &GlobalArgs, json_out: bool) -> Result<()> {
    let coord = open(global).await?;
    let ids = coord.customers().await?;
    if json_out {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "customer_ids": ids }))?
        );
    } else {
        println!("{} customers", ids.len());
        for id in ids {
            println!("{id}");
        }
    }
    Ok(())
}
