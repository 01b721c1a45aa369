#[cfg(test)]
mod scanner_tests {
    use slox as lox;

    use lox::scanner::*;
    use lox::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source.as_bytes());
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})[]:;",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::LEFT_SQRBRACKET, "["),
                (TokenType::RIGHT_SQRBRACKET, "]"),
                (TokenType::COLON, ":"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_two_char_operators() {
        assert_token_sequence(
            "** != == <= >= ! = < >",
            &[
                (TokenType::DOUBLE_STAR, "**"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::BANG, "!"),
                (TokenType::EQUAL, "="),
                (TokenType::LESS, "<"),
                (TokenType::GREATER, ">"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_keywords_and_identifiers() {
        assert_token_sequence(
            "for each as import try catch throw breaker _x1",
            &[
                (TokenType::FOR, "for"),
                (TokenType::EACH, "each"),
                (TokenType::AS, "as"),
                (TokenType::IMPORT, "import"),
                (TokenType::TRY, "try"),
                (TokenType::CATCH, "catch"),
                (TokenType::THROW, "throw"),
                (TokenType::IDENTIFIER, "breaker"),
                (TokenType::IDENTIFIER, "_x1"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_comments_are_skipped() {
        let source = "1 // one\n// nothing here\n2";
        let tokens: Vec<Token> = Scanner::new(source).filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 3);
        assert_eq!(tokens[1].lexeme, "2");
    }

    #[test]
    fn test_scanner_05_numbers() {
        let tokens: Vec<Token> = Scanner::new("12 3.25 7.").filter_map(Result::ok).collect();

        assert!(matches!(tokens[0].token_type, TokenType::NUMBER(n) if n == 12.0));
        assert!(matches!(tokens[1].token_type, TokenType::NUMBER(n) if n == 3.25));
        // A trailing dot is not part of the number.
        assert!(matches!(tokens[2].token_type, TokenType::NUMBER(n) if n == 7.0));
        assert_eq!(tokens[3].token_type, TokenType::DOT);
    }

    #[test]
    fn test_scanner_06_string_delimiters() {
        let tokens: Vec<Token> = Scanner::new(r#""double" 'single' `echo hi`"#)
            .filter_map(Result::ok)
            .collect();

        assert!(matches!(&tokens[0].token_type, TokenType::STRING(s) if s == "double"));
        assert!(matches!(&tokens[1].token_type, TokenType::STRING(s) if s == "single"));
        assert!(matches!(&tokens[2].token_type, TokenType::COMMAND(s) if s == "echo hi"));
    }

    #[test]
    fn test_scanner_07_escapes_drop_the_backslash() {
        let tokens: Vec<Token> = Scanner::new(r#""say \"hi\"" 'it\'s' "a\\b" "\n""#)
            .filter_map(Result::ok)
            .collect();

        assert!(matches!(&tokens[0].token_type, TokenType::STRING(s) if s == "say \"hi\""));
        assert!(matches!(&tokens[1].token_type, TokenType::STRING(s) if s == "it's"));
        assert!(matches!(&tokens[2].token_type, TokenType::STRING(s) if s == "a\\b"));
        // Anything else keeps its backslash.
        assert!(matches!(&tokens[3].token_type, TokenType::STRING(s) if s == "\\n"));
    }

    #[test]
    fn test_scanner_08_multiline_string_counts_lines() {
        let tokens: Vec<Token> = Scanner::new("\"a\nb\"\nx").filter_map(Result::ok).collect();

        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].lexeme, "x");
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let results: Vec<_> = Scanner::new(source.as_bytes()).collect();

        // COMMA, DOT, error, LEFT_PAREN, error, EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let errors: Vec<String> = results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .map(ToString::to_string)
            .collect();

        assert_eq!(
            errors,
            vec![
                "[line 1] ScannerError: Unexpected character '$'.",
                "[line 1] ScannerError: Unexpected character '#'.",
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let (tokens, errors) = scan_tokens("\"open\n");

        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].to_string(),
            "[line 2] ScannerError: Unterminated string."
        );
        assert_eq!(tokens.last().map(|t| t.token_type.clone()), Some(TokenType::EOF));
    }

    #[test]
    fn test_exactly_one_eof() {
        let (tokens, errors) = scan_tokens("");

        assert!(errors.is_empty());
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_type, TokenType::EOF);
    }

    #[test]
    fn test_token_display() {
        let (tokens, _) = scan_tokens("var x = 3 \"s\"");
        let rendered: Vec<String> = tokens.iter().map(ToString::to_string).collect();

        assert_eq!(
            rendered,
            vec![
                "VAR var null",
                "IDENTIFIER x null",
                "EQUAL = null",
                "NUMBER 3 3.0",
                "STRING \"s\" s",
                "EOF  null",
            ]
        );
    }

    fn assert_token_matches(
        result: &Result<Token, lox::error::SloxError>,
        expected_type: TokenType,
        expected_lexeme: &str,
    ) {
        match result {
            Ok(token) => {
                assert_eq!(token.token_type, expected_type);
                assert_eq!(token.lexeme, expected_lexeme);
            }
            Err(e) => panic!("Expected token but got error: {}", e),
        }
    }
}
