//! `conductor doctor` — diagnostic checks, scoped down from the teacher's
//! version to what this gateway actually depends on: no SerialMemory, no
//! workspace directory, just the LLM endpoint, the reasoner artifact, the
//! agent roster, and the checkpoint directory.

use conductor_domain::config::{Config, ConfigSeverity};

pub async fn run(config: &Config, config_path: &str) -> anyhow::Result<bool> {
    println!("conductor doctor");
    println!("================\n");

    let mut all_passed = true;

    check_config_file(config_path, &mut all_passed);
    check_config_validation(config, &mut all_passed);
    check_llm_reachable(&mut all_passed).await;
    check_agents(config, &mut all_passed);
    check_checkpoint_dir(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    Ok(all_passed)
}

fn check_config_file(config_path: &str, all_passed: &mut bool) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file exists",
        exists,
        if exists { config_path.to_owned() } else { format!("{config_path} not found (using defaults)") },
    );
    if !exists {
        *all_passed = false;
    }
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
    } else {
        print_check(
            "Config validation",
            error_count == 0,
            format!("{} issue(s) ({error_count} error(s))", issues.len()),
        );
        for issue in &issues {
            println!("      {issue}");
        }
        if error_count > 0 {
            *all_passed = false;
        }
    }
}

async fn check_llm_reachable(all_passed: &mut bool) {
    let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let reachable = match reqwest::Client::builder().timeout(std::time::Duration::from_secs(5)).build() {
        Ok(client) => client.get(format!("{base_url}/models")).send().await.is_ok(),
        Err(_) => false,
    };

    print_check("LLM endpoint reachable", reachable, if reachable { base_url } else { format!("{base_url} (unreachable)") });

    if !reachable {
        *all_passed = false;
    }
}

fn check_agents(config: &Config, all_passed: &mut bool) {
    let count = config.agents.len();
    let ok = count > 0;
    print_check("Agents configured", ok, if ok { format!("{count} agent(s)") } else { "none configured".into() });
    if !ok {
        *all_passed = false;
    }
}

fn check_checkpoint_dir(config: &Config, all_passed: &mut bool) {
    let Some(dir) = &config.checkpoint_dir else {
        print_check("Checkpoint directory", true, "checkpointing disabled (no checkpoint_dir configured)".into());
        return;
    };

    let path = std::path::Path::new(dir);
    if let Err(e) = std::fs::create_dir_all(path) {
        print_check("Checkpoint directory", false, format!("{dir} (failed to create: {e})"));
        *all_passed = false;
        return;
    }

    let probe = path.join(".conductor_doctor_probe");
    let writable = std::fs::write(&probe, b"probe").is_ok();
    let _ = std::fs::remove_file(&probe);

    print_check(
        "Checkpoint directory",
        writable,
        if writable { format!("{dir} (writable)") } else { format!("{dir} (not writable)") },
    );
    if !writable {
        *all_passed = false;
    }
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
