//! HTTP client against a canned local server.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread;

use pades_signer::adapters::{FinalizationService, PrepareOptions, PreparationService};
use pades_signer::{RemoteServiceConfig, RemoteSigningClient, SigningError};
use zeroize::Zeroizing;

/// Serve one request with `status` and `body`; returns the request line, headers
/// and body that were received.
fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}/api/", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let mut head = String::new();
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
            if line == "\r\n" || line.is_empty() {
                break;
            }
            head.push_str(&line);
        }
        let mut request_body = vec![0u8; content_length];
        reader.read_exact(&mut request_body).unwrap();

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        reader.get_mut().write_all(response.as_bytes()).unwrap();
        head + &String::from_utf8(request_body).unwrap()
    });
    (base_url, handle)
}

fn client(base_url: String) -> RemoteSigningClient {
    let config = RemoteServiceConfig::new(base_url, Zeroizing::new("api-secret".to_string()))
        .with_timeout(10);
    RemoteSigningClient::new(config).unwrap()
}

#[test]
fn prepare_posts_json_with_bearer_token() {
    let (url, server) = serve_once(
        "200 OK",
        r#"{"document_id":"doc-9","field_name":"Signature2"}"#,
    );
    let prepared = client(url)
        .prepare(
            b"%PDF",
            &PrepareOptions {
                visible: true,
                policy_id: Some("pades-basic".into()),
                security_context_id: Some("ctx-1".into()),
                ..PrepareOptions::default()
            },
        )
        .unwrap();
    assert_eq!(prepared.document_id, "doc-9");
    assert_eq!(prepared.field_name.as_deref(), Some("Signature2"));

    let request = server.join().unwrap();
    assert!(request.starts_with("POST /api/pades/prepare "));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer api-secret"));
    assert!(request.contains(r#""pdf_base64":"JVBERg==""#));
    assert!(request.contains(r#""signature_policy_id":"pades-basic""#));
    assert!(request.contains(r#""security_context_id":"ctx-1""#));
    assert!(!request.contains("signature_policy_oid"));
}

#[test]
fn finalize_decodes_the_document() {
    let (url, server) = serve_once("200 OK", r#"{"pdf_base64":"JVBERi1zaWduZWQ="}"#);
    let signed = client(url).finalize("doc-9").unwrap();
    assert_eq!(signed, b"%PDF-signed");
    assert!(server.join().unwrap().contains(r#""document_id":"doc-9""#));
}

#[test]
fn service_errors_are_mapped() {
    let (url, server) = serve_once(
        "409 Conflict",
        r#"{"success":false,"error_code":"FIELD_LOCKED","message":"field already signed"}"#,
    );
    let err = client(url).cms_params("doc-9", None).unwrap_err();
    server.join().unwrap();
    assert!(matches!(
        err,
        SigningError::RemoteRejected(msg) if msg == "[FIELD_LOCKED] field already signed"
    ));

    let (url, server) = serve_once("503 Service Unavailable", "upstream down");
    let err = client(url).finalize("doc-9").unwrap_err();
    server.join().unwrap();
    assert!(matches!(err, SigningError::NetworkError(_)));
    assert!(err.is_remote());
}
