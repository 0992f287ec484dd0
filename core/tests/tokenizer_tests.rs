use search_core::tokenizer::{tokenize, tokenize_with, TokenizerConfig};

#[test]
fn it_lowercases_and_filters_stopwords() {
    let words = tokenize("The quick brown fox and the lazy dog");
    assert!(words.contains(&"quick".to_string()));
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
}

#[test]
fn it_is_idempotent() {
    let text = "Rust 搜索引擎 makes café search fast, fast, FAST";
    assert_eq!(tokenize(text), tokenize(text));
}

#[test]
fn it_keeps_token_lengths_in_bounds() {
    let long = "a".repeat(21);
    let words = tokenize(&format!("x {long} ok"));
    assert_eq!(words, vec!["ok"]);
}

#[test]
fn it_emits_cjk_ngrams_alongside_words() {
    let words = tokenize("hello 中文搜索");
    assert_eq!(words[0], "hello");
    for gram in ["中", "文", "中文", "文搜", "搜索", "中文搜", "文搜索"] {
        assert!(words.contains(&gram.to_string()), "missing {gram}");
    }
    assert!(!tokenize("plain ascii").iter().any(|w| w.chars().count() == 1));
}

#[test]
fn it_caps_tokens_per_document() {
    let text: String = (0..50).map(|i| format!("word{} ", char::from(b'a' + (i % 26) as u8).to_string().repeat(i / 26 + 2))).collect();
    let cfg = TokenizerConfig { max_tokens_per_doc: 10, ..Default::default() };
    let words = tokenize_with(&text, &cfg);
    assert_eq!(words.len(), 10);
    assert_eq!(words, tokenize(&text)[..10].to_vec());
}

#[test]
fn it_returns_nothing_for_empty_or_stopword_text() {
    assert!(tokenize("").is_empty());
    assert!(tokenize("the a an").is_empty());
}
