use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
struct Expectation {
    exit_code: i32,
    #[serde(default)]
    stdout_contains: Vec<String>,
    #[serde(default)]
    stderr_contains: Vec<String>,
}

#[derive(Debug, Default)]
struct Outcome {
    exit_code: i32,
    stdout: String,
    stderr: String,
}

impl Outcome {
    fn normalize(mut self) -> Self {
        self.stdout = self.stdout.replace("\r\n", "\n");
        self.stderr = self.stderr.replace("\r\n", "\n");
        self
    }

    fn as_expectation(&self) -> Expectation {
        let first_diagnostic = self
            .stderr
            .lines()
            .find(|line| line.starts_with("error") || line.starts_with("warning"))
            .map(str::to_string);
        Expectation {
            exit_code: self.exit_code,
            stdout_contains: self.stdout.lines().take(1).map(str::to_string).collect(),
            stderr_contains: first_diagnostic.into_iter().collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Default, Debug)]
struct AllExpectations {
    cases: HashMap<String, Expectation>,
}

fn f90check_exe() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_f90check"))
}

/// Runs the checker on one case. Leading comment lines may carry
/// `! args: <flags>` and `! command: <subcommand>` (default `check`).
fn run_case(f90check: &Path, src: &Path) -> Outcome {
    let content = fs::read_to_string(src).expect("failed to read source file");

    let mut flags: Vec<String> = Vec::new();
    let mut command = "check".to_string();
    for line in content.lines() {
        let line = line.trim();
        if let Some(text) = line.strip_prefix("! args:") {
            flags.extend(text.split_whitespace().map(str::to_string));
        } else if let Some(text) = line.strip_prefix("! command:") {
            command = text.trim().to_string();
        } else if !line.starts_with('!') {
            break;
        }
    }

    let out = Command::new(f90check)
        .env("NO_COLOR", "1")
        .env("TERM", "dumb")
        .args(&flags)
        .arg(&command)
        .arg(src)
        .output()
        .expect("failed to run f90check");
    Outcome {
        exit_code: out.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&out.stdout).to_string(),
        stderr: String::from_utf8_lossy(&out.stderr).to_string(),
    }
    .normalize()
}

fn expectations_path() -> PathBuf {
    PathBuf::from("tests/expectations.json")
}

fn load_all() -> AllExpectations {
    if let Ok(d) = fs::read_to_string(expectations_path()) {
        serde_json::from_str(&d).unwrap_or_default()
    } else {
        AllExpectations::default()
    }
}

fn save_all(all: &AllExpectations) {
    let mut items: Vec<_> = all.cases.iter().collect();
    items.sort_by_key(|(k, _)| k.get(0..2).and_then(|p| p.parse::<u8>().ok()).unwrap_or(0));

    let mut ordered = serde_json::Map::new();
    for (k, v) in items {
        ordered.insert(k.clone(), serde_json::to_value(v).unwrap());
    }

    let data = serde_json::to_string_pretty(&serde_json::json!({ "cases": ordered })).unwrap();
    fs::write(expectations_path(), data).unwrap();
}

fn list_test_files() -> Vec<PathBuf> {
    let mut files: Vec<_> = fs::read_dir("tests/cases")
        .unwrap()
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .map(|e| e.eq_ignore_ascii_case("f90"))
                .unwrap_or(false)
        })
        .filter(|p| {
            // include only files with stem like "01_name" .. "99_name"
            if let Some(stem_os) = p.file_stem() {
                let s = stem_os.to_string_lossy();
                if s.len() < 3 || s.as_bytes().get(2) != Some(&b'_') {
                    return false;
                }
                if let Ok(n) = s[0..2].parse::<u8>() {
                    return (1..=99).contains(&n);
                }
            }
            false
        })
        .collect();
    files.sort();
    files
}

fn process_case(
    stem: &str,
    got: Outcome,
    all: &mut AllExpectations,
    record: bool,
    changed: &mut bool,
    failures: &mut Vec<String>,
) {
    if record || !all.cases.contains_key(stem) {
        all.cases.insert(stem.to_string(), got.as_expectation());
        println!("[recorded] {}", stem);
        *changed = true;
        return;
    }
    let exp = &all.cases[stem];
    let mut ok = true;

    if exp.exit_code != got.exit_code {
        println!("---- {} ----", stem);
        println!("exit expected {} got {}", exp.exit_code, got.exit_code);
        ok = false;
    }
    for fragment in &exp.stdout_contains {
        if !got.stdout.contains(fragment.as_str()) {
            println!("---- {} ----", stem);
            println!("stdout is missing {:?}\nGOT:\n{}", fragment, got.stdout);
            ok = false;
        }
    }
    for fragment in &exp.stderr_contains {
        if !got.stderr.contains(fragment.as_str()) {
            println!("---- {} ----", stem);
            println!("stderr is missing {:?}\nGOT:\n{}", fragment, got.stderr);
            ok = false;
        }
    }

    if ok {
        println!("[ok] {}", stem);
    } else {
        failures.push(stem.to_string());
    }
}

#[test]
fn check_cases() {
    let record = std::env::args().skip(1).any(|a| a == "--record")
        || std::env::var("TESTSUITE_RECORD") == Ok("1".into());

    let f90check = f90check_exe();
    let mut all = load_all();
    let mut changed = false;
    let mut failures = Vec::new();

    for path in list_test_files() {
        let stem = path.file_stem().unwrap().to_string_lossy().to_string();
        let got = run_case(&f90check, &path);
        process_case(&stem, got, &mut all, record, &mut changed, &mut failures);
    }

    if record && changed {
        save_all(&all);
    }

    assert!(failures.is_empty(), "test failures: {:?}", failures);
}
