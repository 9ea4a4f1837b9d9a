use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use authgen_config::{OutputFormat, Settings};
use authgen_core::AuthPolicy;
use authgen_envoy::{DocumentSerializer, PolicyCompiler, serializer_for};

use crate::cli::CompileArgs;
use crate::output::print_success;

pub async fn compile(settings: &Settings, args: &CompileArgs) -> Result<()> {
    let source = read_policy(args.file.as_deref())?;
    let format = args.format.unwrap_or(settings.output.format);
    let compiler = PolicyCompiler::from_settings(settings)?;

    let document = render_policy(&compiler, &source, format).await?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &document)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!("Wrote {format} to {}", path.display()));
        }
        None => print!("{document}"),
    }
    Ok(())
}

/// Parse, compile and serialize a policy. Nothing is written here so a
/// failure leaves no partial output behind.
pub async fn render_policy(
    compiler: &PolicyCompiler,
    source: &str,
    format: OutputFormat,
) -> Result<String> {
    let policy = AuthPolicy::from_yaml_str(source).context("Failed to parse AuthPolicy")?;
    let filter = compiler
        .compile_filter(&policy)
        .await
        .with_context(|| format!("Failed to compile AuthPolicy '{}'", policy.name()))?;
    Ok(serializer_for(format).serialize(&filter)?)
}

fn read_policy(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read policy from stdin")?;
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const POLICY: &str = r#"
apiVersion: ztoperator.kartverket.no/v1alpha1
kind: AuthPolicy
metadata:
  name: demo
spec:
  wellKnownURI: http://mock-oauth2.auth:8080/default/.well-known/openid-configuration
  ignoreAuthRules:
    - paths: ["/health"]
  selector:
    matchLabels:
      app: demo
"#;

    fn compiler() -> PolicyCompiler {
        PolicyCompiler::from_settings(&Settings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_render_yaml() {
        let out = render_policy(&compiler(), POLICY, OutputFormat::Yaml)
            .await
            .unwrap();
        assert!(out.starts_with("apiVersion: networking.istio.io/v1alpha3\n"));
        assert!(out.contains("name: demo-login"));
        assert!(out.contains("address: mock-oauth2.auth"));
    }

    #[tokio::test]
    async fn test_render_json() {
        let out = render_policy(&compiler(), POLICY, OutputFormat::Json)
            .await
            .unwrap();
        assert!(out.trim_start().starts_with('{'));
        assert!(out.contains("\"kind\": \"EnvoyFilter\""));
    }

    #[tokio::test]
    async fn test_missing_uri_reports_context() {
        let policy = POLICY.replace(
            "http://mock-oauth2.auth:8080/default/.well-known/openid-configuration",
            "\"\"",
        );
        let err = render_policy(&compiler(), &policy, OutputFormat::Yaml)
            .await
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Failed to compile AuthPolicy 'demo'"));
        assert!(message.contains("wellKnownURI"));
    }

    #[test]
    fn test_read_policy_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(POLICY.as_bytes()).unwrap();
        let source = read_policy(Some(file.path())).unwrap();
        assert_eq!(source, POLICY);
    }

    #[test]
    fn test_read_policy_missing_file() {
        let err = read_policy(Some(Path::new("/nonexistent/policy.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read /nonexistent/policy.yaml"));
    }
}
