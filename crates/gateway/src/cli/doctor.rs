use sl_domain::config::{Config, ConfigSeverity};

use crate::bootstrap::build_provider;

/// Run all diagnostic checks and print a summary.
///
/// Returns `true` when every check passes.
pub fn run(config: &Config, config_path: &str) -> bool {
    println!("seriallog doctor");
    println!("================\n");

    let mut all_passed = true;

    check_config_file(config_path);
    check_config_validation(config, &mut all_passed);
    check_log_dir(config, &mut all_passed);
    check_serial_ports(config, &mut all_passed);
    check_bind_address(config, &mut all_passed);

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    all_passed
}

// ── Individual checks ─────────────────────────────────────────────────

/// A missing file is not a failure: every setting has a default.
fn check_config_file(config_path: &str) {
    let exists = std::path::Path::new(config_path).exists();
    print_check(
        "Config file",
        true,
        if exists {
            config_path.to_owned()
        } else {
            format!("{config_path} not found (using defaults)")
        },
    );
}

fn check_config_validation(config: &Config, all_passed: &mut bool) {
    let issues = config.validate();
    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();

    if issues.is_empty() {
        print_check("Config validation", true, "no issues".into());
        return;
    }

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

fn check_log_dir(config: &Config, all_passed: &mut bool) {
    let dir = &config.logs.dir;
    let writable = std::fs::create_dir_all(dir).is_ok() && {
        let marker = dir.join(".seriallog_doctor_write_check");
        let ok = std::fs::write(&marker, b"ok").is_ok();
        let _ = std::fs::remove_file(&marker);
        ok
    };

    print_check(
        "Log directory",
        writable,
        if writable {
            format!("{} (writable)", dir.display())
        } else {
            format!("{} (not writable)", dir.display())
        },
    );
    if !writable {
        *all_passed = false;
    }
}

/// Zero ports is reported but not a failure; devices come and go.
fn check_serial_ports(config: &Config, all_passed: &mut bool) {
    match build_provider(config).list_ports() {
        Ok(ports) => print_check(
            "Serial ports",
            true,
            format!("{} port(s) visible via {:?} provider", ports.len(), config.serial.provider),
        ),
        Err(e) => {
            print_check("Serial ports", false, e.to_string());
            *all_passed = false;
        }
    }
}

fn check_bind_address(config: &Config, all_passed: &mut bool) {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let ok = std::net::TcpListener::bind(&addr).is_ok();
    print_check(
        "Listen address",
        ok,
        if ok {
            format!("{addr} available")
        } else {
            format!("{addr} in use or not bindable")
        },
    );
    if !ok {
        *all_passed = false;
    }
}

// ── Formatting helper ─────────────────────────────────────────────────

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
