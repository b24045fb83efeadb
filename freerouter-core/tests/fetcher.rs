//! Fetch cycles end to end: factory, merge policy, partial failure, writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use freerouter_core::config::{CollisionPolicy, Declarations, ProviderConfig, Settings};
use freerouter_core::factory::{ProviderFactory, ProviderRegistry};
use freerouter_core::fetcher::Outcome;
use freerouter_core::providers::{BuildContext, LocalDiscoveryProvider, Provider, ProviderKind};
use freerouter_core::{Error, Fetcher, ModelDescriptor, OutputDocument, Result, ServiceEntry};
use tempfile::TempDir;

/// Test provider with a scripted result and an optional delay.
struct Scripted {
    name: &'static str,
    delay: Duration,
    result: std::result::Result<Vec<&'static str>, fn(&str) -> Error>,
}

impl Scripted {
    fn ok(name: &'static str, models: &[&'static str]) -> Box<dyn Provider> {
        Box::new(Self {
            name,
            delay: Duration::ZERO,
            result: Ok(models.to_vec()),
        })
    }

    fn slow(name: &'static str, delay_ms: u64, models: &[&'static str]) -> Box<dyn Provider> {
        Box::new(Self {
            name,
            delay: Duration::from_millis(delay_ms),
            result: Ok(models.to_vec()),
        })
    }

    fn failing(name: &'static str) -> Box<dyn Provider> {
        Box::new(Self {
            name,
            delay: Duration::ZERO,
            result: Err(|provider| Error::UpstreamUnavailable {
                provider: provider.to_string(),
                reason: "connection refused".to_string(),
            }),
        })
    }
}

#[async_trait]
impl Provider for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::ApiDiscovery
    }

    async fn fetch_models(&self) -> Result<Vec<ModelDescriptor>> {
        tokio::time::sleep(self.delay).await;
        match &self.result {
            Ok(ids) => Ok(ids.iter().map(|id| ModelDescriptor::new(*id)).collect()),
            Err(make) => Err(make(self.name)),
        }
    }

    fn format_service(&self, model: &ModelDescriptor) -> ServiceEntry {
        let base = format!("https://{}.test/v1", self.name);
        ServiceEntry::new(self.name, &model.id).api_base(Some(base.as_str()))
    }
}

fn names(doc: &OutputDocument) -> Vec<&str> {
    doc.model_list.iter().map(|e| e.model_name.as_str()).collect()
}

#[tokio::test]
async fn one_failing_provider_does_not_sink_the_run() {
    let dir = TempDir::new().unwrap();
    let fetcher = Fetcher::new(dir.path().join("config.yaml"));

    let report = fetcher
        .run(vec![
            Scripted::ok("alpha", &["a1", "a2"]),
            Scripted::failing("beta"),
            Scripted::ok("gamma", &["g1"]),
        ])
        .await
        .unwrap();

    assert_eq!(names(&report.document), ["a1", "a2", "g1"]);
    assert_eq!(report.contributing(), 2);
    assert!(matches!(
        report.providers[1].outcome,
        Outcome::Failed { kind: "unreachable", .. }
    ));
    assert_eq!(
        report.summary(),
        "2 of 3 providers contributed models; beta: unreachable"
    );

    let written = OutputDocument::load(&dir.path().join("config.yaml")).unwrap();
    assert_eq!(written, report.document);
}

#[tokio::test]
async fn later_declaration_wins_regardless_of_completion_order() {
    for concurrent in [true, false] {
        let fetcher = Fetcher::new("unused.yaml").concurrent(concurrent);
        // "first" is declared first but finishes last.
        let report = fetcher
            .collect(vec![
                Scripted::slow("first", 150, &["x", "only-first"]),
                Scripted::ok("second", &["x"]),
            ])
            .await
            .unwrap();

        assert_eq!(names(&report.document), ["x", "only-first"]);
        assert_eq!(report.document.model_list[0].backend(), "second");
        assert_eq!(report.overwrites.len(), 1);
        assert_eq!(report.overwrites[0].replaced, "first");
        assert_eq!(report.overwrites[0].winner, "second");
    }
}

#[tokio::test]
async fn strict_policy_fails_the_run_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    let fetcher = Fetcher::new(&path).collision_policy(CollisionPolicy::Strict);

    let err = fetcher
        .run(vec![Scripted::ok("a", &["x"]), Scripted::ok("b", &["x"])])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DuplicateService { .. }));
    assert!(!path.exists());
}

#[tokio::test]
async fn zero_providers_is_an_error_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");

    let err = Fetcher::new(&path).run(Vec::new()).await.unwrap_err();

    assert!(matches!(err, Error::NoProvidersConfigured));
    assert!(!path.exists());
}

#[tokio::test]
async fn zero_successes_still_writes_a_valid_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");

    let report = Fetcher::new(&path)
        .run(vec![Scripted::failing("a"), Scripted::failing("b")])
        .await
        .unwrap();

    assert_eq!(report.contributing(), 0);
    assert!(report.summary().starts_with("0 of 2 providers contributed models"));
    let written = OutputDocument::load(&path).unwrap();
    assert!(written.model_list.is_empty());
    assert!(written.litellm_settings.drop_params);
}

#[tokio::test]
async fn unreachable_local_daemon_is_skipped() {
    let provider = LocalDiscoveryProvider::from_params(
        "ollama",
        &freerouter_core::env::ResolvedParams::resolve(
            &serde_yaml::from_str("api_base: http://127.0.0.1:9\ntimeout: 2").unwrap(),
            &HashMap::<String, String>::new(),
        ),
        &BuildContext::default(),
    )
    .unwrap();

    let report = Fetcher::new("unused.yaml")
        .collect(vec![
            Box::new(provider) as Box<dyn Provider>,
            Scripted::ok("alpha", &["a1"]),
        ])
        .await
        .unwrap();

    assert!(matches!(report.providers[0].outcome, Outcome::Skipped { .. }));
    assert_eq!(
        report.summary(),
        "1 of 2 providers contributed models; ollama was unreachable"
    );
}

#[tokio::test]
async fn static_provider_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    let decls = Declarations::from_yaml(
        r#"
providers:
  - type: static
    backend: test-backend
    models: ["m1", "m2"]
"#,
    )
    .unwrap();

    let built = ProviderFactory::builtin().create_all(&decls.providers);
    let report = Fetcher::new(&path).run(built.providers).await.unwrap();

    let doc = OutputDocument::load(&path).unwrap();
    assert_eq!(doc, report.document);
    assert_eq!(doc.model_list.len(), 2);
    for (entry, name) in doc.model_list.iter().zip(["m1", "m2"]) {
        assert_eq!(entry.model_name, name);
        assert_eq!(entry.backend(), "test-backend");
        assert_eq!(entry.litellm_params.model, format!("test-backend/{name}"));
    }
}

#[tokio::test]
async fn single_model_static_declaration() {
    let provider = ProviderFactory::builtin()
        .create(
            &ProviderConfig::new("static")
                .param("model_name", "test-model")
                .param("provider", "openai")
                .param("api_base", "https://api.test.com")
                .param("api_key", "test-key"),
        )
        .unwrap();

    let report = Fetcher::new("unused.yaml")
        .collect(vec![provider])
        .await
        .unwrap();

    let models = &report.document.model_list;
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].model_name, "test-model");
    assert_eq!(models[0].litellm_params.model, "openai/test-model");
    assert_eq!(models[0].litellm_params.api_key.as_deref(), Some("test-key"));
}

#[tokio::test]
async fn settings_flow_into_the_document() {
    let settings = Settings {
        request_timeout: Some(300),
        num_retries: 5,
        ..Settings::default()
    };
    let report = Fetcher::from_settings("unused.yaml", &settings, "sk-fixed".to_string())
        .collect(vec![Scripted::ok("a", &["x"])])
        .await
        .unwrap();

    let doc = &report.document;
    assert_eq!(doc.litellm_settings.master_key.as_deref(), Some("sk-fixed"));
    assert_eq!(doc.litellm_settings.request_timeout, Some(300));
    assert_eq!(doc.router_settings.num_retries, 5);

    let yaml = doc.to_yaml().unwrap();
    assert!(yaml.contains("master_key: sk-fixed"));
}

#[test]
fn create_all_builds_one_instance_per_enabled_entry() {
    let factory = ProviderFactory::new(
        ProviderRegistry::builtin(),
        Arc::new(HashMap::<String, String>::new()),
        BuildContext::default(),
    );
    let entry = |n: usize| {
        ProviderConfig::new("static")
            .param("backend", "b")
            .param("models", vec![format!("m{n}")])
    };

    for n in 0..5 {
        let mut configs: Vec<_> = (0..n).map(entry).collect();
        configs.push(entry(99).disabled());
        let built = factory.create_all(&configs);
        assert_eq!(built.providers.len(), n);
        assert_eq!(built.disabled, 1);
        assert!(built.failures.is_empty());
    }
}

#[tokio::test]
async fn build_failures_are_reported_with_the_run() {
    let dir = TempDir::new().unwrap();
    let factory = ProviderFactory::new(
        ProviderRegistry::builtin(),
        Arc::new(HashMap::from([("FOO".to_string(), "bar123".to_string())])),
        BuildContext::default(),
    );
    let configs = vec![
        ProviderConfig::new("openrouter").param("api_key", "${UNSET_VAR}"),
        ProviderConfig::new("bedrock"),
        ProviderConfig::new("manual")
            .param("model_name", "m")
            .param("provider", "openai")
            .param("api_key", "${FOO}"),
    ];

    let built = factory.create_all(&configs);
    assert_eq!(built.providers.len(), 1);
    assert_eq!(
        built.failures.iter().map(|f| f.index).collect::<Vec<_>>(),
        [0, 1]
    );

    let report = Fetcher::new(dir.path().join("config.yaml"))
        .run(built.providers)
        .await
        .unwrap()
        .with_build_failures(built.failures);

    assert_eq!(report.attempted(), 3);
    assert_eq!(report.document.model_list[0].litellm_params.api_key.as_deref(), Some("bar123"));
    assert_eq!(
        report.summary(),
        "1 of 3 providers contributed models; openrouter: missing environment variable, bedrock: unknown provider type"
    );
}
