//! Image builder integration tests
//!
//! Drive recipe resolution, staging, layer keys and the build state machine on
//! a temporary context. The Docker build itself only runs when
//! `ANALYST_DOCKER_TESTS=1` and a daemon is reachable.

mod support;

use analyst::image::{
    docker_available, layer_keys, render_dockerfile, stage_to_bytes, stage_to_path, BuildContext,
    BuildState, ContextError, ImageBuilder, ImageError, ImageRecipe,
};
use std::fs;
use std::io::Read;
use support::{service_context, write_service_files};
use tempfile::TempDir;
use yare::parameterized;

fn entries(bytes: &[u8]) -> Vec<(String, u32)> {
    let mut archive = tar::Archive::new(bytes);
    archive
        .entries()
        .expect("Failed to read archive")
        .map(|e| {
            let entry = e.expect("Bad entry");
            let path = entry.path().expect("Bad path").to_string_lossy().to_string();
            let mode = entry.header().mode().expect("Bad mode");
            (path, mode)
        })
        .collect()
}

#[test]
fn test_staged_context_contains_sources() {
    let dir = service_context();
    let recipe = ImageRecipe::default();
    let context = BuildContext::resolve(dir.path(), &recipe).expect("Context should resolve");

    let staged = entries(&stage_to_bytes(&recipe, &context).expect("Staging failed"));
    let names: Vec<&str> = staged.iter().map(|(p, _)| p.as_str()).collect();

    for required in ["Dockerfile", "requirements.txt", "app.py", "index.html", "entrypoint.sh"] {
        assert!(names.contains(&required), "missing {required}");
    }

    let mode = staged
        .iter()
        .find(|(p, _)| p == "entrypoint.sh")
        .map(|(_, m)| m & 0o777);
    assert_eq!(mode, Some(0o755));
}

#[test]
fn test_rendered_recipe_contract() {
    let dir = service_context();
    let recipe = ImageRecipe::default();
    let context = BuildContext::resolve(dir.path(), &recipe).unwrap();
    let dockerfile = render_dockerfile(&recipe, &context);

    let exposes: Vec<&str> = dockerfile
        .lines()
        .filter(|l| l.starts_with("EXPOSE"))
        .collect();
    assert_eq!(exposes, vec!["EXPOSE 8000"]);

    assert!(dockerfile.contains(
        "CMD [\"uvicorn\", \"app:app\", \"--host\", \"0.0.0.0\", \"--port\", \"8000\"]"
    ));
    assert!(dockerfile
        .lines()
        .any(|l| l.starts_with("RUN apt-get") && l.ends_with("rm -rf /var/lib/apt/lists/*")));
}

#[test]
fn test_missing_launch_object_fails_validation() {
    let dir = TempDir::new().unwrap();
    write_service_files(dir.path());
    fs::write(dir.path().join("app.py"), "application = None\n").unwrap();

    let err = BuildContext::resolve(dir.path(), &ImageRecipe::default()).unwrap_err();
    assert!(matches!(
        err,
        ImageError::Context(ContextError::LaunchTargetMissing { .. })
    ));
}

#[test]
fn test_dependency_key_tracks_manifest_only() {
    let dir = service_context();
    let recipe = ImageRecipe::default();
    let dep_key = |root: &std::path::Path| {
        let context = BuildContext::resolve(root, &recipe).unwrap();
        layer_keys(&recipe, &context)
            .unwrap()
            .into_iter()
            .find(|k| k.step == "install-dependencies")
            .unwrap()
            .key
    };

    let original = dep_key(dir.path());

    fs::write(dir.path().join("app.py"), format!("{}\n# edited\n", support::APP_PY)).unwrap();
    fs::write(dir.path().join("index.html"), "<h1>changed</h1>\n").unwrap();
    assert_eq!(dep_key(dir.path()), original);

    fs::write(dir.path().join("requirements.txt"), "fastapi==0.111.0\nuvicorn\n").unwrap();
    assert_ne!(dep_key(dir.path()), original);
}

#[parameterized(
    none = { &[], None },
    single = { &[".env"], Some("COPY .env ./") },
    several = { &[".env.production", ".env", ".env.local"], Some("COPY .env .env.local .env.production ./") },
)]
fn test_env_file_matching(files: &[&str], expected_copy: Option<&str>) {
    let dir = service_context();
    for name in files {
        fs::write(dir.path().join(name), "KEY=value\n").unwrap();
    }

    let recipe = ImageRecipe::default();
    let context = BuildContext::resolve(dir.path(), &recipe).expect("Zero or more env files is valid");
    assert_eq!(context.env_files().len(), files.len());

    let dockerfile = render_dockerfile(&recipe, &context);
    match expected_copy {
        Some(line) => assert!(dockerfile.lines().any(|l| l == line), "{dockerfile}"),
        None => assert!(!dockerfile.contains(".env")),
    }
}

#[test]
fn test_default_recipe_walks_every_state() {
    let recipe = ImageRecipe::default();
    let states = BuildState::walk(&recipe.steps(&[])).expect("Default recipe is ordered");
    assert_eq!(states.first(), Some(&BuildState::Start));
    assert_eq!(states.last(), Some(&BuildState::Done));
    assert_eq!(states.len(), 9);
}

#[test]
fn test_stage_to_gzip_file() {
    let dir = service_context();
    let out_dir = TempDir::new().unwrap();
    let out = out_dir.path().join("context.tar.gz");

    let recipe = ImageRecipe::default();
    let context = BuildContext::resolve(dir.path(), &recipe).unwrap();
    stage_to_path(&recipe, &context, &out).expect("Staging to file failed");

    let mut decoded = Vec::new();
    flate2::read::GzDecoder::new(fs::File::open(&out).unwrap())
        .read_to_end(&mut decoded)
        .unwrap();
    assert!(entries(&decoded).iter().any(|(p, _)| p == "Dockerfile"));
}

#[tokio::test]
async fn test_docker_build_verifies_image() {
    if std::env::var("ANALYST_DOCKER_TESTS").as_deref() != Ok("1") || !docker_available().await {
        println!("Skipping Docker build (set ANALYST_DOCKER_TESTS=1 with a running daemon)");
        return;
    }

    let dir = service_context();
    fs::write(dir.path().join(".env"), "GREETING=hello\n").unwrap();

    let recipe = ImageRecipe::default();
    let context = BuildContext::resolve(dir.path(), &recipe).unwrap();
    let tag = format!("analyst-test:{}", uuid::Uuid::new_v4().simple());

    let report = ImageBuilder::connect(recipe, context)
        .expect("Failed to connect to Docker")
        .build(&tag)
        .await
        .expect("Image build failed");

    assert_eq!(report.exposed_ports, vec!["8000/tcp"]);
    assert_eq!(
        report.command,
        vec!["uvicorn", "app:app", "--host", "0.0.0.0", "--port", "8000"]
    );
    assert_eq!(report.states.last(), Some(&BuildState::Done));
    assert_eq!(report.env_files, vec![".env"]);

    let docker = bollard::Docker::connect_with_local_defaults().unwrap();
    let _ = docker
        .remove_image(
            &tag,
            Some(bollard::image::RemoveImageOptions {
                force: true,
                ..Default::default()
            }),
            None,
        )
        .await;
}
