use std::time::Duration;

use covgate::error::CovgateError;
use covgate::report::Report;
use covgate::threshold::{self, Expression, ExpressionError, Metric, MetricValues, Metrics};

fn report(coverage: &[u8], time_secs: u64) -> Report {
    let mut report = Report::new();
    report.coverage = Some(covgate::detect::sniff(coverage).unwrap().1);
    report.set_test_execution_time(Duration::from_secs(time_secs));
    report
}

#[test]
fn gate_on_current_and_baseline() {
    let current = report(include_bytes!("fixtures/sample.gocov"), 80);
    let baseline = report(b"mode: set\nmain.go:1.1,2.2 1 1\nmain.go:3.1,4.2 1 0\n", 100);
    let metrics = Metrics::from_reports(&current, Some(&baseline));

    // 5/7 vs 1/2
    assert!(threshold::evaluate("current.coverage > 71% && current.coverage < 72%", &metrics).unwrap());
    assert!(threshold::evaluate("diff.coverage > 0", &metrics).unwrap());
    assert!(threshold::evaluate("diff.time <= -20s", &metrics).unwrap());
    assert!(!threshold::evaluate("current.time > prev.time", &metrics).unwrap());
}

#[test]
fn per_metric_rules() {
    let metrics = Metrics {
        current: MetricValues {
            coverage: Some(80.0),
            ratio: Some(1.5),
            time: Some(Duration::from_secs(90)),
        },
        prev: None,
    };

    let rules = [
        (Metric::Coverage, "80%", true),
        (Metric::Coverage, "diff >= 0", true),
        (Metric::Ratio, "1:1.5", true),
        (Metric::Ratio, "1:2", false),
        (Metric::Time, "1m30s", true),
        (Metric::Time, "current < 1m", false),
    ];
    for (metric, src, expected) in rules {
        let expr = Expression::compile_for(metric, src).unwrap();
        assert_eq!(expr.evaluate(&metrics).unwrap(), expected, "{src}");
    }
}

#[test]
fn unmeasured_metric_is_an_error() {
    let metrics = Metrics::from_reports(&Report::new(), None);
    assert!(matches!(
        threshold::evaluate("current.ratio >= 1", &metrics),
        Err(CovgateError::Unmeasured(_))
    ));
}

#[test]
fn compile_errors_are_typed() {
    assert!(matches!(
        Expression::compile("current.coverage >= 1m"),
        Err(ExpressionError::TypeMismatch { op: ">=", .. })
    ));
    assert!(matches!(
        Expression::compile("coverage >= 80"),
        Err(ExpressionError::UnknownVariable(name)) if name == "coverage"
    ));
}

#[test]
fn baseline_metric_is_readable_without_current() {
    let baseline = report(b"mode: set\nmain.go:1.1,2.2 1 1\nmain.go:3.1,4.2 1 0\n", 100);
    let metrics = Metrics::from_reports(&Report::new(), Some(&baseline));

    assert!(threshold::evaluate("prev.coverage == 50%", &metrics).unwrap());
    assert!(threshold::evaluate("prev.time == 100s", &metrics).unwrap());
    assert!(matches!(
        threshold::evaluate("current.coverage > prev.coverage", &metrics),
        Err(CovgateError::Unmeasured(name)) if name == "current.coverage"
    ));
}

#[test]
fn overlong_chain_is_a_syntax_error() {
    let chain = vec!["true"; 200_000].join("&&");
    assert!(matches!(
        Expression::compile(&chain),
        Err(ExpressionError::Syntax { .. })
    ));

    let rules = vec!["current.coverage >= 0"; 50].join(" && ");
    let metrics = Metrics::from_reports(&report(include_bytes!("fixtures/sample.gocov"), 1), None);
    assert!(Expression::compile(&rules).unwrap().evaluate(&metrics).unwrap());
}
