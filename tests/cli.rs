//! Integration tests that run the `lrag` binary against a temporary corpus
//! and a mocked OpenAI-compatible API.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const KEY_ENV: &str = "LRAG_TEST_OPENAI_KEY";

fn lrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("lrag");
    path
}

/// Minimal valid PDF containing the text "consent withdrawal notice".
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    let content = b"BT /F1 12 Tf 100 700 Td (consent withdrawal notice) Tj ET";
    out.extend_from_slice(format!("4 0 obj << /Length {} >> stream\n", content.len()).as_bytes());
    out.extend_from_slice(content);
    out.extend_from_slice(b"\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Embedding endpoint that returns one 3-d vector per input text:
/// occurrences of "consent", "erasure" and "contract".
fn embed_responder(req: &Request) -> ResponseTemplate {
    let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
    let inputs = body["input"].as_array().cloned().unwrap_or_default();
    let data: Vec<serde_json::Value> = inputs
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let text = text.as_str().unwrap_or_default().to_lowercase();
            let v: Vec<f32> = ["consent", "erasure", "contract"]
                .iter()
                .map(|k| text.matches(k).count() as f32)
                .collect();
            serde_json::json!({"object": "embedding", "index": i, "embedding": v})
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "object": "list",
        "data": data,
        "model": "text-embedding-3-small"
    }))
}

async fn mock_openai() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(embed_responder)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Consent may be withdrawn. [Source: gdpr.txt]"}}],
            "usage": {"prompt_tokens": 900, "completion_tokens": 50, "total_tokens": 950}
        })))
        .mount(&server)
        .await;
    server
}

struct Env {
    _tmp: TempDir,
    config: PathBuf,
    docs: PathBuf,
    index: PathBuf,
}

fn setup(api_base: &str) -> Env {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    let index = tmp.path().join("index");
    fs::create_dir_all(&docs).unwrap();

    let config = tmp.path().join("lrag.toml");
    fs::write(
        &config,
        format!(
            r#"
[documents]
root = "{docs}"

[index]
dir = "{index}"

[chunking]
window_words = 12
overlap_words = 4

[embedding]
base_url = "{base}"
api_key_env = "{key}"
batch_size = 2

[generation]
base_url = "{base}"
api_key_env = "{key}"
"#,
            docs = docs.display(),
            index = index.display(),
            base = api_base,
            key = KEY_ENV
        ),
    )
    .unwrap();

    Env {
        _tmp: tmp,
        config,
        docs,
        index,
    }
}

fn run(config: &Path, args: &[&str]) -> Output {
    Command::new(lrag_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .env(KEY_ENV, "sk-test")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run lrag")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn write_corpus(docs: &Path) {
    let gdpr = format!(
        "{}\n\n{}",
        vec!["consent"; 20].join(" "),
        vec!["erasure"; 10].join(" ")
    );
    fs::write(docs.join("gdpr.txt"), gdpr).unwrap();
    fs::write(docs.join("civil.txt"), vec!["contract"; 8].join(" ")).unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_build_stats_search_ask() {
    let api = mock_openai().await;
    let env = setup(&api.uri());
    write_corpus(&env.docs);

    let output = run(&env.config, &["build", "--progress", "off"]);
    assert!(output.status.success(), "build failed: {:?}", output);
    let out = stdout(&output);
    // civil.txt: 8 words -> 1 chunk. gdpr.txt: 30 words, stride 8 -> 4 chunks.
    assert!(out.contains("files: 2"), "{}", out);
    assert!(out.contains("chunks: 5"), "{}", out);
    assert!(out.contains("dims: 3"), "{}", out);
    assert!(env.index.join("vectors.bin").exists());
    assert!(env.index.join("chunks.json").exists());

    let output = run(&env.config, &["stats", "--json"]);
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(stats["total_chunks"], 5);
    assert_eq!(stats["total_vectors"], 5);
    assert_eq!(stats["sources"], serde_json::json!(["civil.txt", "gdpr.txt"]));

    let output = run(&env.config, &["search", "contract contract", "--k", "1", "--json"]);
    assert!(output.status.success());
    let hits: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(hits.as_array().unwrap().len(), 1);
    assert_eq!(hits[0]["chunk"]["source"], "civil.txt");
    assert_eq!(hits[0]["rank"], 1);

    let output = run(&env.config, &["ask", "Can consent be withdrawn?", "--json"]);
    assert!(output.status.success());
    let answer: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(answer["num_chunks_used"], 3);
    assert_eq!(answer["tokens_used"]["total"], 950);
    assert_eq!(answer["model"], "gpt-4o-mini");
    assert!(answer["estimated_cost"]["total_cost_usd"].as_f64().unwrap() > 0.0);

    let output = run(&env.config, &["ask", "Can consent be withdrawn?"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Consent may be withdrawn."));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dry_run_writes_nothing() {
    let env = setup("http://127.0.0.1:9");
    write_corpus(&env.docs);
    fs::write(env.docs.join("notice.pdf"), minimal_pdf()).unwrap();

    let output = run(&env.config, &["build", "--dry-run"]);
    assert!(output.status.success(), "dry run failed: {:?}", output);
    let out = stdout(&output);
    assert!(out.contains("files found: 3"), "{}", out);
    assert!(out.contains("approx. embedding cost"), "{}", out);
    assert!(!env.index.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pdf_is_indexed() {
    let api = mock_openai().await;
    let env = setup(&api.uri());
    fs::write(env.docs.join("notice.pdf"), minimal_pdf()).unwrap();

    let output = run(&env.config, &["build"]);
    assert!(output.status.success(), "build failed: {:?}", output);

    let chunks: serde_json::Value =
        serde_json::from_slice(&fs::read(env.index.join("chunks.json")).unwrap()).unwrap();
    let text = chunks["chunks"][0]["text"].as_str().unwrap();
    assert!(text.contains("consent withdrawal notice"), "{}", text);
    assert_eq!(chunks["chunks"][0]["source"], "notice.pdf");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_embedding_outage_fails_build() {
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(1)
        .mount(&api)
        .await;
    let env = setup(&api.uri());
    write_corpus(&env.docs);

    let output = run(&env.config, &["build"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("503"));
    assert!(!env.index.join("vectors.bin").exists());
}

#[test]
fn test_stats_without_index_fails() {
    let env = setup("http://127.0.0.1:9");
    let output = run(&env.config, &["stats"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("index not found"));
}

#[test]
fn test_invalid_chunking_config_rejected() {
    let env = setup("http://127.0.0.1:9");
    let body = fs::read_to_string(&env.config)
        .unwrap()
        .replace("overlap_words = 4", "overlap_words = 12");
    fs::write(&env.config, body).unwrap();

    let output = run(&env.config, &["build", "--dry-run"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("overlap"));
}
