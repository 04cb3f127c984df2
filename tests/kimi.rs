//! Integration tests for the Kimi tokenizer pipeline.
//!
//! These run the full segmentation + merge + special-token path over a
//! synthetic byte-level vocabulary shaped like the real one: every single
//! byte is present, merge ranks are dense on top, and the reserved
//! special-token block starts immediately after the base vocabulary.

use rustc_hash::FxHashMap;

use kimitok::{
    build_special_tokens, from_kimi_files, Segmenter, SpecialTokenPolicy, Tokenizer,
    TokenizerError, KIMI_PATTERN, NUM_RESERVED_SPECIAL_TOKENS,
};

/// 256 single-byte entries (rank = byte value) plus two digit merges,
/// so the base vocabulary has 258 dense ranks.
const NUM_BASE_TOKENS: u32 = 258;

fn base_encoder() -> FxHashMap<Vec<u8>, u32> {
    let mut encoder = FxHashMap::default();
    for b in 0u8..=255 {
        encoder.insert(vec![b], b as u32);
    }
    encoder.insert(b"34".to_vec(), 256);
    encoder.insert(b"45".to_vec(), 257);
    encoder
}

fn make_kimi_tokenizer() -> Tokenizer {
    let metadata = r#"{
        "added_tokens_decoder": {
            "258": {"content": "<|im_end|>", "special": true},
            "259": {"content": "<|im_user|>", "special": true}
        }
    }"#;
    let special = build_special_tokens(metadata, NUM_BASE_TOKENS).unwrap();
    Tokenizer::new(base_encoder(), special, KIMI_PATTERN).unwrap()
}

#[test]
fn test_round_trip_without_specials() {
    let tokenizer = make_kimi_tokenizer();

    let test_cases = [
        "Hello, world!",
        "The quick brown fox jumps over the lazy dog.",
        "I'm sure they'll've... no, they'd be fine",
        "1234567890",
        "Special characters: !@#$%^&*()",
        "Multi-line\ntext\nwith\nnewlines",
        "Unicode: こんにちは 世界 🦀",
        "mixed 中文 and English 123 ",
        "  trailing and leading  ",
        "",
    ];

    for text in test_cases {
        let tokens = tokenizer
            .encode_with_policy(text, SpecialTokenPolicy::Forbid)
            .unwrap();
        let decoded = tokenizer.decode(&tokens).unwrap();
        assert_eq!(decoded, text, "Roundtrip failed for: {:?}", text);
    }
}

#[test]
fn test_partition_invariant() {
    let segmenter = Segmenter::new(KIMI_PATTERN).unwrap();
    let texts = [
        "Hello, 世界! It's 12345...\r\n\r\n  done  ",
        "päätös ÅNGSTRÖM ǅungla",
        "\t\t\tindent\u{00a0}nbsp",
    ];
    for text in texts {
        let chunks: Vec<&str> = segmenter
            .segments(text)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(chunks.concat(), text, "chunks must partition {:?}", text);
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }
}

#[test]
fn test_merge_determinism() {
    let tokenizer = make_kimi_tokenizer();
    let text = "determinism 123 determinism 123";
    let first = tokenizer.encode(text).unwrap();
    let second = tokenizer.encode(text).unwrap();
    let from_clone = tokenizer.clone().encode(text).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, from_clone);
}

#[test]
fn test_digit_run_truncation() {
    let tokenizer = make_kimi_tokenizer();
    // "12345" segments as "123" then "45". The "45" merge (rank 257) applies
    // inside the second chunk; the "34" merge (rank 256) never gets the
    // chance because the 3 and the 4 sit in different chunks.
    let tokens = tokenizer.encode("12345").unwrap();
    assert_eq!(tokens, vec![49, 50, 51, 257]);
}

#[test]
fn test_special_token_boundary() {
    let tokenizer = make_kimi_tokenizer();
    let tokens = tokenizer
        .encode_with_special("Hello<|im_end|> world")
        .unwrap();
    assert_eq!(
        tokens,
        vec![72, 101, 108, 108, 111, 258, 32, 119, 111, 114, 108, 100]
    );
}

#[test]
fn test_special_token_boundary_small_base() {
    // Ten-entry base vocabulary: ranks 0..=9 over the bytes a..=j, with the
    // reserved block starting at id 10.
    let mut encoder = FxHashMap::default();
    for (rank, b) in (b'a'..=b'j').enumerate() {
        encoder.insert(vec![b], rank as u32);
    }
    let metadata = r#"{"added_tokens_decoder": {"10": {"content": "<|test_token|>"}}}"#;
    let special = build_special_tokens(metadata, 10).unwrap();
    assert_eq!(special.len(), NUM_RESERVED_SPECIAL_TOKENS as usize);

    let tokenizer = Tokenizer::new(encoder, special, KIMI_PATTERN).unwrap();
    let tokens = tokenizer.encode_with_special("abc<|test_token|>def").unwrap();
    assert_eq!(tokens, vec![0, 1, 2, 10, 3, 4, 5]);
}

#[test]
fn test_id_range_validity() {
    let tokenizer = make_kimi_tokenizer();
    let upper = NUM_BASE_TOKENS + NUM_RESERVED_SPECIAL_TOKENS;
    assert_eq!(tokenizer.vocab_size() as u32, upper);

    let texts = [
        "plain text 0123",
        "<|im_end|>spliced<|im_user|>",
        "punctuation!!! \r\n 中文",
    ];
    for text in texts {
        let tokens = tokenizer.encode_with_special(text).unwrap();
        assert!(tokens.iter().all(|&id| id < upper), "id out of range");
    }

    // Decode accepts the whole reserved range and nothing past it.
    assert_eq!(
        tokenizer.decode(&[upper - 1]).unwrap(),
        format!("<|reserved_token_{}|>", upper - 1)
    );
    assert!(matches!(
        tokenizer.decode(&[upper]),
        Err(TokenizerError::UnknownTokenId(id)) if id == upper
    ));
}

#[test]
fn test_special_token_rejection() {
    let tokenizer = make_kimi_tokenizer();
    let result = tokenizer.encode_with_policy("<|im_end|>", SpecialTokenPolicy::Forbid);
    assert!(matches!(
        result,
        Err(TokenizerError::DisallowedSpecialToken { token }) if token == "<|im_end|>"
    ));
}

#[test]
fn test_plain_text_policy_encodes_special_names_as_text() {
    let tokenizer = make_kimi_tokenizer();
    let tokens = tokenizer
        .encode_with_policy("<|im_end|>", SpecialTokenPolicy::PlainText)
        .unwrap();
    assert!(!tokens.contains(&258));
    assert_eq!(tokenizer.decode(&tokens).unwrap(), "<|im_end|>");
}

#[test]
fn test_empty_input() {
    let tokenizer = make_kimi_tokenizer();
    assert!(tokenizer.encode("").unwrap().is_empty());
    assert!(tokenizer.encode_with_special("").unwrap().is_empty());
    assert_eq!(tokenizer.decode(&[]).unwrap(), "");
}

#[test]
fn test_batch_matches_individual() {
    let tokenizer = make_kimi_tokenizer();
    let texts = vec![
        "Hello, world!".to_string(),
        "How are you?".to_string(),
        "I'm doing great!".to_string(),
    ];
    let batch = tokenizer.encode_batch(&texts);
    assert_eq!(batch.len(), 3);
    for (result, text) in batch.iter().zip(&texts) {
        assert_eq!(result.as_ref().unwrap(), &tokenizer.encode(text).unwrap());
    }
}

#[test]
fn test_batch_isolates_failures() {
    let tokenizer = make_kimi_tokenizer();
    let texts = vec![
        "good".to_string(),
        "bad <|im_end|> here".to_string(),
        "also good".to_string(),
    ];
    let batch = tokenizer.encode_batch_with_policy(&texts, SpecialTokenPolicy::Forbid);
    assert!(batch[0].is_ok());
    assert!(batch[1].is_err());
    assert!(batch[2].is_ok());
}

#[test]
fn test_from_kimi_files() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("tiktoken.model");
    let config_path = dir.path().join("tokenizer_config.json");

    // "a" => YQ==, "b" => Yg==, "ab" => YWI=
    std::fs::write(&model_path, "YQ== 0\nYg== 1\nYWI= 2\n").unwrap();
    std::fs::write(
        &config_path,
        r#"{"added_tokens_decoder": {"3": {"content": "<|eot|>"}}}"#,
    )
    .unwrap();

    let tokenizer = from_kimi_files(
        model_path.to_str().unwrap(),
        config_path.to_str().unwrap(),
    )
    .unwrap();

    assert_eq!(tokenizer.vocab_size(), 3 + 256);
    assert_eq!(tokenizer.encode("ab").unwrap(), vec![2]);
    assert_eq!(tokenizer.encode_with_special("<|eot|>").unwrap(), vec![3]);
    assert_eq!(tokenizer.decode(&[3]).unwrap(), "<|eot|>");
    assert_eq!(tokenizer.decode(&[2, 0]).unwrap(), "aba");
}

#[test]
fn test_missing_model_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("tokenizer_config.json");
    std::fs::write(&config_path, "{}").unwrap();

    let result = from_kimi_files(
        dir.path().join("nope.model").to_str().unwrap(),
        config_path.to_str().unwrap(),
    );
    assert!(matches!(result, Err(TokenizerError::VocabError(_))));
}
