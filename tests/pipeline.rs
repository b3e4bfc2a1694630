use obfuscator_swc_plugin::{
    obfuscate, obfuscate_file, obfuscate_program, syntax, ConfigurationError, ObfuscatorError,
    ObfuscatorOptions, Pattern, StringArrayEncoding, TransformError,
};
use regex::Regex;
use swc_core::ecma::ast::Program;

const SAMPLE: &str = r#"
'use strict';
function greet(person, greeting) {
    var message = greeting + ', ' + person.name;
    outer: for (var i = 0; i < 2; i++) {
        if (i) break outer;
    }
    return { message, length: message.length };
}
console.log(greet({ name: 'World' }, 'Hello'));
"#;

fn full_options(seed: u64) -> ObfuscatorOptions {
    ObfuscatorOptions {
        string_array_threshold: 1.0,
        string_array_encoding: vec![
            StringArrayEncoding::None,
            StringArrayEncoding::Base64,
            StringArrayEncoding::Rc4,
        ],
        rename_globals: true,
        disable_console_output: true,
        seed: Some(seed),
        ..Default::default()
    }
}

#[test]
fn same_seed_gives_identical_output() {
    let first = obfuscate(SAMPLE, &full_options(42)).unwrap();
    let second = obfuscate(SAMPLE, &full_options(42)).unwrap();
    assert_eq!(first.code, second.code);
    assert_eq!(first.stats, second.stats);
}

#[test]
fn output_parses_again() {
    let result = obfuscate(SAMPLE, &full_options(3)).unwrap();
    let (_, program) = syntax::parse_program("out.js", &result.code).unwrap();
    assert!(matches!(program, Program::Script(_)));
}

#[test]
fn stats_cover_every_transformer() {
    let result = obfuscate(SAMPLE, &full_options(5)).unwrap();
    let stats = result.stats;
    // greet, person, greeting, message, i
    assert_eq!(stats.renamed_bindings, 5);
    assert_eq!(stats.renamed_labels, 1);
    // "Hello" and "World"; ", " is too short and "name" is a key
    assert_eq!(stats.string_array_entries, 2);
    assert_eq!(stats.string_array_calls, 2);
}

#[test]
fn console_output_is_disabled_up_front() {
    let opts = ObfuscatorOptions {
        string_array: false,
        disable_console_output: true,
        seed: Some(1),
        ..Default::default()
    };
    let code = obfuscate("console.log('hi there');", &opts).unwrap().code;
    let disable = code.find("exception").expect("console template missing");
    let call = code.find("console.log(").expect("original call missing");
    assert!(disable < call, "{code}");
    assert!(code.contains("constructor"));
}

#[test]
fn console_template_follows_directives() {
    let opts = ObfuscatorOptions {
        string_array: false,
        disable_console_output: true,
        seed: Some(1),
        ..Default::default()
    };
    let code = obfuscate("'use strict';\nfoo();", &opts).unwrap().code;
    let code = code.trim_start();
    assert!(
        code.starts_with("\"use strict\"") || code.starts_with("'use strict'"),
        "{code}"
    );
}

#[test]
fn threshold_out_of_range_is_rejected() {
    let opts = ObfuscatorOptions {
        string_array_threshold: 1.5,
        ..Default::default()
    };
    match obfuscate("var a = 'x';", &opts) {
        Err(ObfuscatorError::Configuration(ConfigurationError::ThresholdOutOfRange(t))) => {
            assert_eq!(t, 1.5)
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn empty_encoding_set_is_rejected() {
    let opts = ObfuscatorOptions {
        string_array_encoding: vec![],
        ..Default::default()
    };
    assert!(matches!(
        obfuscate("var a = 'x';", &opts),
        Err(ObfuscatorError::Configuration(ConfigurationError::EmptyEncodingSet))
    ));
}

#[test]
fn options_round_trip_from_plugin_json() {
    let opts = ObfuscatorOptions::from_json(
        r#"{
            "stringArrayThreshold": 1,
            "stringArrayEncoding": ["rc4"],
            "reservedStrings": ["^keep"],
            "renameGlobals": true,
            "seed": 9
        }"#,
    )
    .unwrap();
    assert_eq!(opts.string_array_encoding, vec![StringArrayEncoding::Rc4]);
    assert_eq!(opts.reserved_strings, vec![Pattern::new("^keep").unwrap()]);
    assert!(opts.rename_globals);
    assert!(opts.string_array);

    let code = obfuscate("var v = 'keep me';", &opts).unwrap().code;
    assert!(code.contains("keep me"));
}

#[test]
fn malformed_json_is_a_configuration_error() {
    assert!(matches!(
        ObfuscatorOptions::from_json(r#"{ "reservedNames": ["("] }"#),
        Err(ConfigurationError::Json(_))
    ));
    assert!(matches!(
        ObfuscatorOptions::from_json(r#"{ "stringArrayThreshold": 2 }"#),
        Err(ConfigurationError::ThresholdOutOfRange(_))
    ));
}

#[test]
fn syntax_errors_name_the_file() {
    match obfuscate_file("bundle.js", "function (", &ObfuscatorOptions::default()) {
        Err(ObfuscatorError::Parse { file, .. }) => assert_eq!(file, "bundle.js"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn failed_run_leaves_program_untouched() {
    let source = "var greeting = 'hello world';";
    let (cm, mut program) = syntax::parse_program("input.js", source).unwrap();
    let before = syntax::print_program(cm.clone(), &program).unwrap();

    let opts = ObfuscatorOptions {
        string_array_threshold: 1.0,
        reserved_names: vec![Pattern::new(".").unwrap()],
        seed: Some(1),
        ..Default::default()
    };
    let err = obfuscate_program(&mut program, &opts, Some(&*cm)).unwrap_err();
    assert!(matches!(
        err,
        ObfuscatorError::Transform(TransformError::NamesExhausted { .. })
    ));
    assert_eq!(syntax::print_program(cm, &program).unwrap(), before);
}

#[test]
fn jsx_files_are_supported() {
    let opts = ObfuscatorOptions {
        string_array_threshold: 1.0,
        seed: Some(2),
        ..Default::default()
    };
    let src = "function App(props) {\n\
                   var label = 'Click me';\n\
                   return <button title=\"attribute\">{label}</button>;\n\
               }";
    let result = obfuscate_file("app.jsx", src, &opts).unwrap();
    assert!(result.code.contains("attribute"));
    assert!(result.code.contains("<button"));
    let local = Regex::new(r"var (\w+) = \w+\(0\);")
        .unwrap()
        .captures(&result.code)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| panic!("label not extracted:\n{}", result.code));
    assert!(result.code.contains(&format!("{{{local}}}")), "{}", result.code);
}

#[test]
fn debug_protection_runs_before_user_code() {
    let opts = ObfuscatorOptions {
        string_array: false,
        debug_protection: true,
        seed: Some(4),
        ..Default::default()
    };
    let code = obfuscate("'use strict';\nstart();", &opts).unwrap().code;
    assert!(code.contains("'debu' + 'gger'") || code.contains("\"debu\" + \"gger\""));
    let guard = Regex::new(r"var (\w+) = function\s*\(ret\)")
        .unwrap()
        .captures(&code)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| panic!("guard not found:\n{code}"));
    let installed = code.find(&format!("{guard}();")).expect("guard never called");
    let user = code.find("start();").expect("user code missing");
    assert!(installed < user, "{code}");
    let code = code.trim_start();
    assert!(code.starts_with("'use strict'") || code.starts_with("\"use strict\""));
}

#[test]
fn debug_protection_is_off_by_default() {
    let opts = ObfuscatorOptions {
        seed: Some(4),
        ..Default::default()
    };
    let code = obfuscate("start();", &opts).unwrap().code;
    assert!(!code.contains("gger"));
}
