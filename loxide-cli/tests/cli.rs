use assert_cmd::Command;
use std::io::Write;

fn loxide() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("loxide"))
}

#[test]
fn runs_a_script_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "print \"hello\";").unwrap();

    loxide()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicates::str::contains("hello"));
}

#[test]
fn script_file_runs_the_whole_pipeline() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "fun fib(n) {{ if (n <= 1) return n; return fib(n - 2) + fib(n - 1); }}"
    )
    .unwrap();
    writeln!(file, "print fib(10);").unwrap();

    loxide()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicates::str::contains("55"));
}

#[test]
fn script_with_classes_and_super() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "class A {{ m() {{ return \"A\"; }} }}").unwrap();
    writeln!(file, "class B < A {{ m() {{ return super.m() + \"B\"; }} }}").unwrap();
    writeln!(file, "print B().m();").unwrap();

    loxide()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicates::str::contains("AB"));
}

#[test]
fn too_many_arguments_prints_usage_and_exits_64() {
    loxide()
        .args(["one.lox", "two.lox"])
        .assert()
        .code(64)
        .stderr(predicates::str::contains("Usage: loxide [script]"));
}

#[test]
fn missing_file_exits_65_with_io_error() {
    loxide()
        .arg("does_not_exist.lox")
        .assert()
        .code(65)
        .stderr(predicates::str::contains("could not read script"));
}

#[test]
fn script_error_exits_65() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "print ghost;").unwrap();

    loxide()
        .arg(file.path())
        .assert()
        .code(65)
        .stderr(predicates::str::contains("runtime error on line 1"))
        .stderr(predicates::str::contains("Undefined variable"));
}

#[test]
fn file_errors_name_the_file() {
    let mut file = tempfile::NamedTempFile::with_suffix(".lox").unwrap();
    file.write_all(b"@\n").unwrap();

    let output = loxide().arg(file.path()).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let filename = file.path().file_name().unwrap().to_string_lossy();
    assert!(
        stderr.contains(filename.as_ref()),
        "stderr should mention {}: {}",
        filename,
        stderr
    );
}

#[test]
fn empty_stdin_succeeds() {
    loxide().write_stdin("").assert().success();
}

#[test]
fn piped_stdin_is_run_as_a_program() {
    loxide()
        .write_stdin("print 1 + 2;\n")
        .assert()
        .success()
        .stdout(predicates::str::contains("3"));
}

#[test]
fn piped_stdin_spanning_lines_shares_one_scope() {
    loxide()
        .write_stdin("var x = 1;\n{\n  var x = 99;\n  print x;\n}\nprint x;\n")
        .assert()
        .success()
        .stdout(predicates::str::contains("99"))
        .stdout(predicates::str::contains("1"))
        .stderr(predicates::str::is_empty());
}

#[test]
fn piped_stdin_errors_exit_65() {
    loxide()
        .write_stdin("print 1 +\n")
        .assert()
        .code(65)
        .stderr(predicates::str::contains("parse error"));
}

#[test]
fn lexical_errors_are_labelled_with_their_line() {
    loxide()
        .write_stdin("print 1;\n@\n")
        .assert()
        .code(65)
        .stderr(predicates::str::contains("lexical error on line 2"))
        .stderr(predicates::str::contains("Unexpected character"));
}

#[test]
fn resolution_errors_prevent_any_output() {
    loxide()
        .write_stdin("print 1; return 2;\n")
        .assert()
        .code(65)
        .stdout(predicates::str::is_empty())
        .stderr(predicates::str::contains("resolution error"));
}

#[test]
fn each_error_is_reported_once() {
    let output = loxide().write_stdin("print ghost;\n").output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(
        stderr.matches("Undefined variable").count(),
        1,
        "error should appear exactly once: {}",
        stderr
    );
}

#[test]
fn help_flag_shows_about_text() {
    loxide()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("Lox"));
}
