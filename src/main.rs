//! Coach - Rust 健身训练流水线智能体
//!
//! 入口：初始化日志、加载配置、装配流水线并跑一次运行，按条目渲染最终报告。

use anyhow::Context;
use coach::pipeline::FinalReport;
use coach::{config::load_config, create_llm_from_config, Pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    coach::observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        coach::config::AppConfig::default()
    });

    // 请求文本：命令行参数拼接，缺省用演示请求
    let args: Vec<String> = std::env::args().skip(1).collect();
    let request = if args.is_empty() {
        "I want to build my chest with supersets, intermediate level".to_string()
    } else {
        args.join(" ")
    };

    let llm = create_llm_from_config(&cfg);
    let pipeline = Pipeline::from_config(&cfg, llm.clone());

    let report = match pipeline.run(&request).await {
        Ok(report) => report,
        Err(e) => {
            if e.is_validation() {
                eprintln!("The plan failed safety validation twice; adjust the request (mention restrictions explicitly) and retry.");
            }
            return Err(e).context("Pipeline run failed");
        }
    };

    let (prompt_tokens, completion_tokens, total_tokens) = llm.token_usage();
    tracing::info!(prompt_tokens, completion_tokens, total_tokens, "llm token usage");

    print!("{}", render(&report));
    Ok(())
}

/// 条目式摘要渲染
fn render(report: &FinalReport) -> String {
    let mut out = String::new();
    out.push_str("FINAL WORKOUT SUMMARY\n");
    out.push_str(&format!("- Muscle: {}\n", report.muscle));
    out.push_str(&format!("- Goal: {:?}\n", report.goal));
    out.push_str(&format!("- Level: {:?}\n\n", report.experience));

    out.push_str("WORKOUT (validated):\n");
    for e in &report.exercises {
        out.push_str(&format!(
            "- {} — {}x{} — rest {}s\n",
            e.name, e.sets, e.reps, e.rest_seconds
        ));
    }

    out.push_str("\nEQUIPMENT:\n");
    out.push_str(&format!("- Primary: {}\n", report.equipment.primary.join(", ")));
    if !report.equipment.alternatives.is_empty() {
        out.push_str(&format!(
            "- Alternatives: {}\n",
            report.equipment.alternatives.join(", ")
        ));
    }
    if !report.equipment.matched {
        out.push_str("- (no exact match for this muscle, fallback set shown)\n");
    }

    out.push_str("\nRECOMMENDATIONS:\n");
    for r in &report.recommendations {
        out.push_str(&format!("- {}\n", r));
    }

    out.push_str("\nMEMORY:\n- Workout saved.\n");
    out
}
