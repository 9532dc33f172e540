mod common;

use serde_json::Value;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use series_a_digest::artifacts::OutputDir;
use series_a_digest::model::Memo;
use series_a_digest::narrator::Narrator;

use common::{test_config, VOICE_ID, XI_KEY};

#[tokio::test]
async fn test_synthesize_writes_provider_audio() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), tmp.path());
    let audio = vec![0x49, 0x44, 0x33, 0x04, 0x00];

    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{VOICE_ID}")))
        .and(header("xi-api-key", XI_KEY))
        .and(header("accept", "audio/mpeg"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(audio.clone(), "audio/mpeg"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let narrator = Narrator::new(&config.narrator, XI_KEY).unwrap();
    let output = OutputDir::new(&config.output_dir);
    let memo = Memo::new("Three companies raised Series A rounds this week.");
    let artifact = narrator.synthesize(&memo, VOICE_ID, &output).await.unwrap();

    assert_eq!(artifact.bytes, audio);
    assert_eq!(artifact.path, config.output_dir.join("memo.mp3"));
    assert_eq!(artifact.content_type, "audio/mpeg");
    assert_eq!(std::fs::read(&artifact.path).unwrap(), audio);

    let requests = server.received_requests().await.unwrap();
    let body: Value = requests[0].body_json().unwrap();
    assert_eq!(body["text"], memo.text());
    assert_eq!(body["model_id"], "eleven_monolingual_v1");
    assert_eq!(body["voice_settings"]["use_speaker_boost"], true);
}

#[tokio::test]
async fn test_synthesis_failure_leaves_no_audio() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), tmp.path());

    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{VOICE_ID}")))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let narrator = Narrator::new(&config.narrator, XI_KEY).unwrap();
    let output = OutputDir::new(&config.output_dir);
    let err = narrator
        .synthesize(&Memo::new("hello"), VOICE_ID, &output)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "SynthesisError");
    assert!(!output.audio_path().exists());
}

#[tokio::test]
async fn test_empty_audio_is_synthesis_error() {
    let server = MockServer::start().await;
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), tmp.path());

    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{VOICE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(Vec::<u8>::new(), "audio/mpeg"))
        .mount(&server)
        .await;

    let narrator = Narrator::new(&config.narrator, XI_KEY).unwrap();
    let err = narrator
        .synthesize(&Memo::new("hello"), VOICE_ID, &OutputDir::new(&config.output_dir))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "SynthesisError");
}
