//! `coteach route` -- classify text with the rule router.
//!
//! Never calls a model, so it works without credentials.

use clap::Args;
use coteach_core::routing::RuleRouter;
use coteach_types::routing::RoutingDecision;

/// Arguments for the `coteach route` subcommand.
#[derive(Args)]
pub struct RouteArgs {
    /// Text to classify.
    pub text: String,

    /// Print the decision as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Run the route command.
pub fn run(args: RouteArgs) -> anyhow::Result<()> {
    let decision = RuleRouter::new().classify(&args.text);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        print!("{}", render(&decision));
    }
    Ok(())
}

fn render(decision: &RoutingDecision) -> String {
    let Some(responder) = decision.responder else {
        return "responder:  none (no rule matched)\n".to_string();
    };
    let mut out = format!(
        "responder:  {responder}\nconfidence: {:.2}\n",
        decision.confidence
    );
    if let Some(ref pattern) = decision.matched_pattern {
        out.push_str(&format!("pattern:    {pattern}\n"));
    }
    if let Some(ref name) = decision.student_name {
        out.push_str(&format!("student:    {name}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_matched_rule() {
        let decision = RuleRouter::new().classify("What are Alex's triggers?");
        let out = render(&decision);
        assert!(out.contains("responder:  STUDENT_AGENT"));
        assert!(out.contains("confidence: 0.95"));
        assert!(out.contains("pattern:    student:possessive"));
        assert!(out.contains("student:    Alex"));
    }

    #[test]
    fn renders_unmatched_text() {
        let out = render(&RoutingDecision::unresolved());
        assert_eq!(out, "responder:  none (no rule matched)\n");
    }
}
