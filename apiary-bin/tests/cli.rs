#[cfg(test)]
mod cli {
    use std::error::Error;
    use std::fs;
    use std::time::Duration;

    use assert_cmd::Command;
    use predicates::str::contains;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tempfile::tempdir;
    use test_utils::{api_error, api_page, mount_json};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type Result<T> = std::result::Result<T, Box<dyn Error>>;

    fn main_command() -> Command {
        // this gets the "main" binary name (e.g. `apiary`)
        let mut cmd =
            Command::cargo_bin(env!("CARGO_PKG_NAME")).expect("Couldn't get cargo package name");
        // keep the environment from leaking into the tests
        cmd.env_remove("APIARY_BASE_URL").env_remove("RUST_LOG");
        cmd
    }

    /// Parse every line of stdout as JSON
    fn json_lines(output: &[u8]) -> Result<Vec<Value>> {
        std::str::from_utf8(output)?
            .lines()
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }

    #[tokio::test]
    async fn test_prints_outcome() -> Result<()> {
        let server = MockServer::start().await;
        mount_json!(server, "/questions/1;2", 200, api_page!([1, 2], has_more));

        let output = main_command()
            .arg("--base-url")
            .arg(server.uri())
            .arg("questions_by_ids")
            .arg("--ids")
            .arg("1,2")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let lines = json_lines(&output)?;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["source"], "Network");
        assert_eq!(lines[0]["items"], serde_json::json!([1, 2]));
        assert_eq!(lines[0]["has_more"], true);
        Ok(())
    }

    #[tokio::test]
    async fn test_repeat_is_served_from_cache() -> Result<()> {
        let server = MockServer::start().await;
        mount_json!(server, "/tags", 200, api_page!(["rust", "tokio"]), 1);

        let output = main_command()
            .args(["--base-url", &server.uri(), "tags", "-n", "3", "--stats"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let lines = json_lines(&output)?;
        let sources: Vec<_> = lines[..3].iter().map(|line| line["source"].clone()).collect();
        assert_eq!(sources, vec!["Network", "Cache", "Cache"]);

        let stats = &lines[3];
        assert_eq!(stats["throttle"]["total_requests"], 1);
        assert_eq!(stats["cache"]["hits"], 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_parallel_repeat_fetches_once() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(api_page!([{ "api_revision": "2024.1" }]))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let output = main_command()
            .args(["--base-url", &server.uri(), "info", "-n", "5", "--parallel"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let lines = json_lines(&output)?;
        assert_eq!(lines.len(), 5);
        let network = lines
            .iter()
            .filter(|line| line["source"] == "Network")
            .count();
        assert_eq!(network, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_api_error_exit_code() -> Result<()> {
        let server = MockServer::start().await;
        mount_json!(
            server,
            "/questions/0",
            400,
            api_error!(400, "bad_parameter", "ids")
        );

        main_command()
            .args(["--base-url", &server.uri(), "questions_by_ids", "-i", "0"])
            .assert()
            .failure()
            .code(2)
            .stdout(contains(r#""source":"RemoteError""#))
            .stdout(contains("bad_parameter"));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_request_is_not_sent() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        main_command()
            .args(["--base-url", &server.uri(), "questions", "pagesize=1000"])
            .assert()
            .code(2)
            .stdout(contains(r#""source":"LocalError""#))
            .stdout(contains("pagesize must be at most 100"));
        Ok(())
    }

    #[tokio::test]
    async fn test_config_file() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sites"))
            .and(query_param("site", "stackoverflow"))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_page!([])))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let config = dir.path().join("apiary.toml");
        fs::write(
            &config,
            format!(
                r#"
                base_url = "{}"
                default_params = ["site=stackoverflow"]
                max_concurrent = 2
                "#,
                server.uri()
            ),
        )?;

        main_command()
            .arg("--config")
            .arg(&config)
            .arg("sites")
            .assert()
            .success();
        Ok(())
    }

    #[test]
    fn test_invalid_config_file() -> Result<()> {
        let dir = tempdir()?;
        let config = dir.path().join("apiary.toml");
        fs::write(&config, "max_concurrency = 3")?;

        main_command()
            .arg("--config")
            .arg(&config)
            .arg("sites")
            .assert()
            .code(3)
            .stderr(contains("Cannot load configuration file"));
        Ok(())
    }

    #[test]
    fn test_missing_base_url() {
        main_command()
            .arg("sites")
            .assert()
            .code(1)
            .stderr(contains("No base URL given"));
    }

    #[test]
    fn test_unknown_endpoint() {
        main_command()
            .args(["--base-url", "https://api.example.com/", "nonsense"])
            .assert()
            .code(1)
            .stderr(contains("Unknown endpoint `nonsense`"));
    }
}
