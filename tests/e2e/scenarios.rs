use super::harness::{TestContext, parse_json, read_file, write_file};

pub struct Scenario {
    pub name: &'static str,
    pub run: fn(&TestContext) -> Result<(), String>,
}

const REQUESTS_HINT: &str = "\
set(proj python-requests)
set(requirements_file ${CMAKE_BINARY_DIR}/${proj}-requirements.txt)
file(WRITE ${requirements_file} [===[
  # [requests]
  requests==2.30.0 --hash=sha256:0000
  # [/requests]
  ]===])
";

const INSTALLED_LISTING: &str = "\
Package  Version
-------- -------
requests 2.30.0
vtk      9.3.0
";

const OUTDATED_LISTING: &str = "\
Package  Version Latest Type
-------- ------- ------ -----
requests 2.30.0  2.31.0 wheel
";

const REQUESTS_JSON: &str = r#"{
    "info": {"name": "requests"},
    "releases": {
        "2.30.0": [
            {
                "filename": "requests-2.30.0-py3-none-any.whl",
                "python_version": "py3",
                "packagetype": "bdist_wheel",
                "digests": {"sha256": "aaaa"}
            }
        ],
        "2.31.0": [
            {
                "filename": "requests-2.31.0-py3-none-any.whl",
                "python_version": "py3",
                "packagetype": "bdist_wheel",
                "digests": {"sha256": "bbbb"}
            },
            {
                "filename": "requests-2.31.0.tar.gz",
                "python_version": "source",
                "packagetype": "sdist",
                "digests": {"sha256": "cccc"}
            }
        ]
    }
}"#;

pub fn scenarios() -> Vec<Scenario> {
    let mut scenarios = vec![
        Scenario {
            name: "help_output",
            run: scenario_help,
        },
        Scenario {
            name: "invalid_cpython_tag",
            run: scenario_invalid_cpython_tag,
        },
        Scenario {
            name: "missing_search_directory",
            run: scenario_missing_directory,
        },
        Scenario {
            name: "validate_consistent_hints",
            run: scenario_validate_ok,
        },
        Scenario {
            name: "validate_mismatched_hints",
            run: scenario_validate_mismatch,
        },
        Scenario {
            name: "validate_json_output",
            run: scenario_validate_json,
        },
        Scenario {
            name: "mismatch_blocks_update",
            run: scenario_mismatch_blocks_update,
        },
    ];

    #[cfg(unix)]
    scenarios.extend([
        Scenario {
            name: "update_from_outdated_packages",
            run: scenario_update_outdated,
        },
        Scenario {
            name: "update_other_interpreter_keeps_versions",
            run: scenario_update_other_interpreter,
        },
        Scenario {
            name: "update_dry_run",
            run: scenario_update_dry_run,
        },
    ]);

    scenarios
}

fn scenario_help(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("help")?;
    let output = ctx.run_pinsync(&env, &["--help"])?;
    output.assert_success()?;
    output.assert_stdout_contains("--search-directory")?;
    output.assert_stdout_contains("--validate")?;
    Ok(())
}

fn scenario_invalid_cpython_tag(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("invalid-tag")?;
    let output = ctx.run_pinsync(&env, &["--cpython-tag", "3.11", "--validate"])?;
    output.assert_exit(2)?;
    output.assert_stderr_contains("Invalid CPython tag")?;
    Ok(())
}

fn scenario_missing_directory(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("missing-dir")?;
    let missing = env.root.join("does-not-exist").display().to_string();
    let output = ctx.run_pinsync(&env, &["--validate", "-s", &missing])?;
    output.assert_exit(1)?;
    output.assert_stderr_contains("does not exist")?;
    Ok(())
}

fn scenario_validate_ok(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("validate-ok")?;
    write_file(
        &env.search_dir.join("External_python-requests.cmake"),
        REQUESTS_HINT,
    )?;
    write_file(&env.search_dir.join("nested").join("README.txt"), "docs\n")?;

    let output = ctx.run_pinsync(&env, &["--validate", "-s", &env.search_dir_arg()])?;
    output.assert_success()?;
    output.assert_stdout_contains("Searching external projects in")?;
    output.assert_stdout_contains("All external project hints are consistent")?;
    Ok(())
}

fn scenario_validate_mismatch(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("validate-mismatch")?;
    write_file(
        &env.search_dir.join("nested").join("External_python-foo.cmake"),
        "  # [foo]\n  foo==1.0\n  # [/bar]\n  # [baz]\n",
    )?;

    let output = ctx.run_pinsync(&env, &["--validate", "-s", &env.search_dir_arg()])?;
    output.assert_exit(1)?;
    output.assert_stderr_contains("External_python-foo.cmake\n  foo != bar")?;
    output.assert_stderr_contains("baz is never closed")?;
    Ok(())
}

fn scenario_validate_json(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("validate-json")?;
    write_file(
        &env.search_dir.join("External_python-foo.cmake"),
        "# [foo]\n# [/bar]\n",
    )?;

    let output = ctx.run_pinsync(
        &env,
        &["--validate", "--json", "-s", &env.search_dir_arg()],
    )?;
    output.assert_exit(1)?;
    let json = parse_json(&output.stdout)?;
    if json["valid"] != false {
        return Err(format!("Expected valid=false, got {}", json));
    }
    if json["mismatches"][0]["second"] != "bar" {
        return Err(format!("Unexpected mismatches: {}", json["mismatches"]));
    }
    Ok(())
}

fn scenario_mismatch_blocks_update(ctx: &TestContext) -> Result<(), String> {
    let env = ctx.create_env("mismatch-blocks-update")?;
    let file = env.search_dir.join("External_python-foo.cmake");
    let original = "# [foo]\nfoo==1.0\n# [/bar]\n";
    write_file(&file, original)?;

    // pip would fail to start; validation has to stop the run before that
    let output = ctx.run_pinsync(
        &env,
        &[
            "-s",
            &env.search_dir_arg(),
            "--python",
            "/nonexistent/python-for-pinsync",
        ],
    )?;
    output.assert_exit(1)?;
    output.assert_stderr_contains("foo != bar")?;
    output.assert_stderr_not_contains("Failed to execute")?;

    if read_file(&file)? != original {
        return Err("File was modified despite hint mismatch".to_string());
    }
    Ok(())
}

#[cfg(unix)]
struct UpdateFixture {
    env: super::harness::TestEnv,
    python: String,
    file: std::path::PathBuf,
    server: mockito::ServerGuard,
    _mock: mockito::Mock,
}

#[cfg(unix)]
fn update_fixture(ctx: &TestContext, name: &str) -> Result<UpdateFixture, String> {
    let env = ctx.create_env(name)?;
    let python = env.root.join("bin").join("python");
    super::harness::write_fake_python(&python, "cp311", INSTALLED_LISTING, OUTDATED_LISTING)?;

    let file = env.search_dir.join("External_python-requests.cmake");
    write_file(&file, REQUESTS_HINT)?;
    env.write_config(r#"{"max_retries": 0, "timeout_secs": 5}"#)?;

    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/pypi/requests/json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(REQUESTS_JSON)
        .create();

    Ok(UpdateFixture {
        env,
        python: python.display().to_string(),
        file,
        server,
        _mock: mock,
    })
}

#[cfg(unix)]
fn scenario_update_outdated(ctx: &TestContext) -> Result<(), String> {
    let fixture = update_fixture(ctx, "update-outdated")?;
    let index_url = fixture.server.url();

    let output = ctx.run_pinsync(
        &fixture.env,
        &[
            "-s",
            &fixture.env.search_dir_arg(),
            "--python",
            &fixture.python,
            "--index-url",
            &index_url,
        ],
    )?;
    output.assert_success()?;
    output.assert_stdout_contains("  requests==2.31.0 --hash=sha256:bbbb")?;
    output.assert_stdout_contains("Updated")?;

    let expected = REQUESTS_HINT.replace(
        "requests==2.30.0 --hash=sha256:0000",
        "requests==2.31.0 --hash=sha256:bbbb",
    );
    let actual = read_file(&fixture.file)?;
    if actual != expected {
        return Err(format!("Unexpected file content:\n{}", actual));
    }
    Ok(())
}

#[cfg(unix)]
fn scenario_update_other_interpreter(ctx: &TestContext) -> Result<(), String> {
    let fixture = update_fixture(ctx, "update-other-interpreter")?;
    let index_url = fixture.server.url();

    // cp39 differs from the probed cp311: installed versions are re-pinned
    // and the excluded vtk is never looked up
    let output = ctx.run_pinsync(
        &fixture.env,
        &[
            "-s",
            &fixture.env.search_dir_arg(),
            "-c",
            "cp39",
            "--python",
            &fixture.python,
            "--index-url",
            &index_url,
            "--json",
        ],
    )?;
    output.assert_success()?;

    let json = parse_json(&output.stdout)?;
    if json["listing"] != "installed" || json["target_tag"] != "cp39" {
        return Err(format!("Unexpected report: {}", json));
    }
    if json["skipped"][0] != "vtk" {
        return Err(format!("Expected vtk to be skipped: {}", json));
    }

    let actual = read_file(&fixture.file)?;
    if !actual.contains("  requests==2.30.0 --hash=sha256:aaaa\n  # [/requests]") {
        return Err(format!("Unexpected file content:\n{}", actual));
    }
    Ok(())
}

#[cfg(unix)]
fn scenario_update_dry_run(ctx: &TestContext) -> Result<(), String> {
    let fixture = update_fixture(ctx, "update-dry-run")?;
    let index_url = fixture.server.url();

    let output = ctx.run_pinsync(
        &fixture.env,
        &[
            "-s",
            &fixture.env.search_dir_arg(),
            "--python",
            &fixture.python,
            "--index-url",
            &index_url,
            "--dry-run",
        ],
    )?;
    output.assert_success()?;
    output.assert_stdout_contains("[dry-run] Updated")?;

    if read_file(&fixture.file)? != REQUESTS_HINT {
        return Err("Dry run modified the file".to_string());
    }
    Ok(())
}
