//! End-to-end preprocessing through the session facade.

use cpx_bridge::{
    CallbackError, Error, MacroContext, Punct, Session, Token, TokenCategory,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

fn collect_tokens(session: &mut Session) -> Vec<Token> {
    let mut stream = session.stream();
    let mut tokens = Vec::new();
    while stream.has_next() {
        match stream.next() {
            Ok(tok) => tokens.push(tok),
            Err(err) => panic!("unexpected stream error: {err}"),
        }
    }
    tokens
}

fn spellings(session: &mut Session) -> Vec<String> {
    let tokens = collect_tokens(session);
    tokens
        .iter()
        .map(|t| session.spelling(t).to_string())
        .collect()
}

#[test]
fn static_object_define() {
    let mut session = Session::from_source("test.c", "ABC");
    let Ok(()) = session.define("ABC", "123") else {
        panic!("define should succeed");
    };
    assert_eq!(spellings(&mut session), vec!["123"]);
}

#[test]
fn static_function_define() {
    let mut session = Session::from_source("test.c", "ABC(123)");
    let Ok(()) = session.define("ABC(X)", "X") else {
        panic!("define should succeed");
    };
    assert_eq!(spellings(&mut session), vec!["123"]);
}

#[test]
fn double_macro_expands_to_sum() {
    let mut session = Session::from_source("test.c", "DOUBLE(5)");
    let Ok(()) = session.define_macro(
        "DOUBLE(x)",
        |cx: &mut MacroContext<'_>, args: &[Token]| {
            let mut out = args.to_vec();
            out.push(cx.token(TokenCategory::Punct(Punct::Plus), None)?);
            out.extend_from_slice(args);
            Ok(out)
        },
    ) else {
        panic!("define_macro should succeed");
    };
    assert_eq!(spellings(&mut session), vec!["5", "+", "5"]);
}

#[test]
fn callback_invoked_once_per_invocation_with_argument_tokens() {
    let calls: Rc<RefCell<Vec<Vec<String>>>> = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&calls);

    let mut session = Session::from_source("test.c", "M(x, y) M() end");
    let Ok(()) = session.define_macro(
        "M(a, b)",
        move |cx: &mut MacroContext<'_>, args: &[Token]| {
            record
                .borrow_mut()
                .push(args.iter().map(|t| cx.spelling(t).to_string()).collect());
            Ok(Vec::new())
        },
    ) else {
        panic!("define_macro should succeed");
    };

    assert_eq!(spellings(&mut session), vec!["end"]);
    assert_eq!(
        *calls.borrow(),
        vec![vec!["x".to_string(), "y".to_string()], Vec::new()]
    );
}

#[test]
fn arguments_are_expanded_before_capture() {
    let mut session = Session::from_source("test.c", "#define VAL 5\nDOUBLE(VAL)");
    let Ok(()) = session.define_macro(
        "DOUBLE(x)",
        |cx: &mut MacroContext<'_>, args: &[Token]| {
            let mut out = args.to_vec();
            out.push(cx.token(TokenCategory::Punct(Punct::Plus), None)?);
            out.extend_from_slice(args);
            Ok(out)
        },
    ) else {
        panic!("define_macro should succeed");
    };
    assert_eq!(spellings(&mut session), vec!["5", "+", "5"]);
}

#[test]
fn nested_dynamic_invocations_pair_captures_with_dispatches() {
    let mut session = Session::from_source("test.c", "DOUBLE(DOUBLE(2))");
    let Ok(()) = session.define_macro(
        "DOUBLE(x)",
        |cx: &mut MacroContext<'_>, args: &[Token]| {
            let mut out = args.to_vec();
            out.push(cx.token(TokenCategory::Punct(Punct::Plus), None)?);
            out.extend_from_slice(args);
            Ok(out)
        },
    ) else {
        panic!("define_macro should succeed");
    };
    assert_eq!(
        spellings(&mut session),
        vec!["2", "+", "2", "+", "2", "+", "2"]
    );
}

#[test]
fn duplicate_dynamic_registration_fails_and_keeps_first() {
    let mut session = Session::from_source("test.c", "M()");
    let Ok(()) = session.define_macro("M()", |cx: &mut MacroContext<'_>, _args: &[Token]| {
        Ok(cx.tokenize("1"))
    }) else {
        panic!("first registration should succeed");
    };
    let second = session.define_macro("M()", |cx: &mut MacroContext<'_>, _args: &[Token]| {
        Ok(cx.tokenize("2"))
    });
    assert!(matches!(second, Err(Error::DuplicateDefinition { .. })));
    // The first binding still answers.
    assert_eq!(spellings(&mut session), vec!["1"]);
}

#[test]
fn dynamic_name_cannot_shadow_static_macro() {
    let mut session = Session::from_source("test.c", "");
    let Ok(()) = session.define("X", "1") else {
        panic!("define should succeed");
    };
    let result = session.define_macro("X", |cx: &mut MacroContext<'_>, _args: &[Token]| {
        Ok(cx.tokenize("2"))
    });
    assert!(matches!(result, Err(Error::DuplicateDefinition { .. })));
}

#[test]
fn tokenize_format_round_trip() {
    let mut session = Session::from_source("test.c", "");
    let tokens = session.tokenize("a+b");
    assert_eq!(session.format(&tokens), "a+b");
}

#[test]
fn format_restores_columns_and_lines() {
    let mut session = Session::from_source("test.c", "");
    let tokens = session.tokenize("a + b\n  c");
    assert_eq!(session.format(&tokens), "a + b\n  c");
}

#[test]
fn include_locator_supplies_missing_header() {
    let Ok(dir) = tempfile::tempdir() else {
        panic!("tempdir");
    };
    let header = dir.path().join("resolved.h");
    let Ok(()) = fs::write(&header, "abc\n") else {
        panic!("write header");
    };

    let mut session = Session::from_source("test.c", "#include \"missing.h\"\ntail");
    let target = header.clone();
    session.set_include_locator(move |form: &cpx_bridge::IncludeForm| {
        assert_eq!(form.to_string(), "\"missing.h\"");
        Ok(Some(target.clone()))
    });

    // The header's tokens appear in place of the include, no error surfaced.
    assert_eq!(spellings(&mut session), vec!["abc", "tail"]);
}

#[test]
fn include_locator_nonexistent_path_fails_with_resolved_path() {
    let mut session = Session::from_source("test.c", "#include \"missing.h\"\n");
    let bogus = PathBuf::from("/no/such/dir/missing-resolved.h");
    let reported = bogus.clone();
    session.set_include_locator(move |_form: &cpx_bridge::IncludeForm| Ok(Some(reported.clone())));

    let mut stream = session.stream();
    assert!(stream.has_next());
    let Err(Error::FileNotFound { spelling }) = stream.next() else {
        panic!("nonexistent resolved path should fail");
    };
    // The diagnostic names the resolved path, not the original spelling.
    assert_eq!(spelling, bogus.display().to_string());
}

#[test]
fn include_locator_failure_is_reported_as_resolution_failure() {
    let mut session = Session::from_source("test.c", "#include \"x.h\"\n");
    session.set_include_locator(|_form: &cpx_bridge::IncludeForm| {
        Err(cpx_bridge::ResolveError::new("resolver exploded"))
    });
    let mut stream = session.stream();
    let Err(Error::ResolutionFailure { message }) = stream.next() else {
        panic!("resolver failure should surface as ResolutionFailure");
    };
    assert_eq!(message, "resolver exploded");
}

#[test]
fn unresolved_include_reports_original_spelling() {
    let mut session = Session::from_source("test.c", "#include \"gone.h\"\n");
    let mut stream = session.stream();
    let Err(Error::FileNotFound { spelling }) = stream.next() else {
        panic!("missing include should fail");
    };
    assert_eq!(spelling, "\"gone.h\"");
}

#[test]
fn callback_failure_surfaces_on_next_pull() {
    let mut session = Session::from_source("test.c", "a BOOM() b");
    let Ok(()) = session.define_macro("BOOM()", |_cx: &mut MacroContext<'_>, _args: &[Token]| {
        Err(CallbackError::new("kaput"))
    }) else {
        panic!("define_macro should succeed");
    };

    let mut stream = session.stream();
    let Ok(first) = stream.next() else {
        panic!("first token should be fine");
    };
    assert!(!first.is_eof());
    let Err(Error::CallbackFailure { name, message }) = stream.next() else {
        panic!("callback failure should surface on the next pull");
    };
    assert_eq!(name, "BOOM");
    assert_eq!(message, "kaput");
}

#[test]
fn pragma_callback_receives_expanded_payload() {
    let calls: Rc<RefCell<Vec<Vec<String>>>> = Rc::new(RefCell::new(Vec::new()));
    let record = Rc::clone(&calls);

    let mut session = Session::from_source("test.c", "#define VAL 3\n#pragma tune up VAL\nrest");
    let Ok(()) = session.add_pragma(
        "tune",
        move |cx: &mut MacroContext<'_>, args: &[Token]| {
            record
                .borrow_mut()
                .push(args.iter().map(|t| cx.spelling(t).to_string()).collect());
            Ok(Vec::new())
        },
    ) else {
        panic!("add_pragma should succeed");
    };

    assert_eq!(spellings(&mut session), vec!["rest"]);
    assert_eq!(
        *calls.borrow(),
        vec![vec!["up".to_string(), "3".to_string()]]
    );
}

#[test]
fn pragma_callback_result_is_spliced() {
    let mut session = Session::from_source("test.c", "#pragma emit\nz");
    let Ok(()) = session.add_pragma("emit", |cx: &mut MacroContext<'_>, _args: &[Token]| {
        Ok(cx.tokenize("4 2"))
    }) else {
        panic!("add_pragma should succeed");
    };
    assert_eq!(spellings(&mut session), vec!["4", "2", "z"]);
}

#[test]
fn duplicate_pragma_registration_fails() {
    let mut session = Session::from_source("test.c", "");
    let Ok(()) = session.add_pragma("p", |_cx: &mut MacroContext<'_>, _args: &[Token]| {
        Ok(Vec::new())
    }) else {
        panic!("first add_pragma should succeed");
    };
    let second = session.add_pragma("p", |_cx: &mut MacroContext<'_>, _args: &[Token]| {
        Ok(Vec::new())
    });
    assert!(matches!(second, Err(Error::DuplicateDefinition { .. })));
}

#[test]
fn stream_misuse_after_exhaustion() {
    let mut session = Session::from_source("test.c", "x");
    let mut stream = session.stream();
    let Ok(_) = stream.next() else {
        panic!("one token expected");
    };
    assert!(!stream.has_next());
    assert!(matches!(stream.next(), Err(Error::StreamMisuse)));
    assert!(matches!(stream.next(), Err(Error::StreamMisuse)));
}

#[test]
fn stream_iterator_adapter_yields_results() {
    let mut session = Session::from_source("test.c", "a b");
    let stream = session.stream();
    let collected: Vec<Token> = stream.filter_map(Result::ok).collect();
    assert_eq!(collected.len(), 2);
}

#[test]
fn preprocess_writes_formatted_output() {
    let mut session = Session::from_source("test.c", "#define A 1\nA + 2\n");
    let mut out = Vec::new();
    let Ok(()) = session.preprocess(&mut out) else {
        panic!("preprocess should succeed");
    };
    assert_eq!(String::from_utf8_lossy(&out), "1 + 2\n");
}

#[test]
fn preprocess_propagates_callback_failure() {
    let mut session = Session::from_source("test.c", "BOOM()");
    let Ok(()) = session.define_macro("BOOM()", |_cx: &mut MacroContext<'_>, _args: &[Token]| {
        Err(CallbackError::new("kaput"))
    }) else {
        panic!("define_macro should succeed");
    };
    let mut out = Vec::new();
    assert!(matches!(
        session.preprocess(&mut out),
        Err(Error::CallbackFailure { .. })
    ));
}

#[test]
fn next_pulls_raw_and_expanded_tokens() {
    let mut session = Session::from_source("test.c", "A");
    let Ok(()) = session.define("A", "9") else {
        panic!("define should succeed");
    };
    let Ok(tok) = session.next(true) else {
        panic!("next should succeed");
    };
    assert_eq!(session.spelling(&tok), "9");

    let mut raw = Session::from_source("test.c", "A");
    let Ok(()) = raw.define("A", "9") else {
        panic!("define should succeed");
    };
    let Ok(tok) = raw.next(false) else {
        panic!("next should succeed");
    };
    assert_eq!(raw.spelling(&tok), "A");
}

#[test]
fn diagnostic_consumer_claims_ahead_of_queue() {
    struct Claim(Rc<RefCell<Vec<String>>>);
    impl cpx_bridge::DiagnosticConsumer for Claim {
        fn consume(&mut self, diagnostic: &cpx_bridge::Diagnostic) -> bool {
            if diagnostic.code == cpx_bridge::DiagCode::UserWarning {
                self.0.borrow_mut().push(diagnostic.message.clone());
                return true;
            }
            false
        }
    }

    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut session = Session::from_source("test.c", "#warning fragile\nx");
    session.add_diagnostic_consumer(Box::new(Claim(Rc::clone(&seen))));

    assert_eq!(spellings(&mut session), vec!["x"]);
    assert_eq!(*seen.borrow(), vec!["fragile".to_string()]);
    // Claimed diagnostics never reach the queue.
    assert_eq!(session.diagnostics().warning_count(), 0);
}

#[test]
fn session_from_file_preprocesses_on_disk_sources() {
    let Ok(dir) = tempfile::tempdir() else {
        panic!("tempdir");
    };
    let main = dir.path().join("main.c");
    let Ok(()) = fs::write(&main, "#include \"dep.h\"\nmain_tok\n") else {
        panic!("write main");
    };
    let Ok(()) = fs::write(dir.path().join("dep.h"), "dep_tok\n") else {
        panic!("write dep");
    };

    let Ok(mut session) = Session::from_file(&main) else {
        panic!("session should open the file");
    };
    // Quoted include resolves relative to the including file's directory.
    assert_eq!(spellings(&mut session), vec!["dep_tok", "main_tok"]);
}
