use std::time::Duration;

use crashsym_service::config::Config;
use crashsym_service::report::ReportError;
use crashsym_service::symbolicate::Symbolicator;
use crashsym_service::symbols::DirectorySymbolStore;

use crate::{
    echo_resolver, failing_resolver, fake_resolver, hanging_resolver, read_fixture, setup,
    setup_pipeline, tempdir,
};

#[test]
fn test_symbolicate_crash_report() {
    let (pipeline, _scripts) = setup_pipeline(|_| ());
    let report = read_fixture("apple_crash_report.txt");

    let response = pipeline.process_report(&report).unwrap();

    // Frames of both app binaries got their trailing column replaced, everything to the
    // left of it untouched.
    assert!(response.report.contains(
        "0   MyFramework                   0x000000010c74b120 MyFramework_sym 0x000000010c74b120"
    ));
    assert!(response.report.contains(
        "2   MyApp                         0x000000010c6e9a84 MyApp_sym 0x000000010c6e9a84"
    ));
    assert!(response.report.contains(
        "2   MyApp                         0x000000010c6f1377 MyApp_sym 0x000000010c6f1377"
    ));
    assert!(!response.report.contains("0x10c6e3000 + 27268"));

    // The unmapped frame, the already-symbolicated frame and the image listing survive
    // byte for byte.
    assert!(response.report.contains(
        "4   ???                           0x000000010d8f4000 0x10d8f4000 + 0"
    ));
    assert!(response.report.contains(
        "5   libdyld.dylib                 0x00007fff66c8acc9 start + 1"
    ));
    assert!(response.report.contains(
        "       0x10c6e3000 -        0x10c6f5fff +MyApp (1.4.2 - 1312)"
    ));

    assert_eq!(response.process.name, "MyApp");
    assert_eq!(response.process.identifier, "com.example.MyApp");
    assert_eq!(response.process.version, "1.4.2");
    assert_eq!(response.process.build, "1312");
    assert_eq!(response.process.normalized_arch(), "x86_64");

    assert_eq!(response.stats.frames_selected, 6);
    assert_eq!(response.stats.frames_resolved, 5);
    assert_eq!(response.stats.frames_missing_base, 1);
    assert_eq!(response.stats.frames_no_symbol, 0);
    assert_eq!(response.stats.frames_missing_symbols, 0);
    assert_eq!(response.stats.frames_failed, 0);
}

#[test]
fn test_symbolication_is_idempotent() {
    // Feeding an already symbolicated report through the pipeline again must not change it:
    // resolved frames no longer carry a raw trailing column.

    let (pipeline, _scripts) = setup_pipeline(|_| ());
    let report = read_fixture("apple_crash_report.txt");

    let first = pipeline.process_report(&report).unwrap();
    let second = pipeline.process_report(&first.report).unwrap();

    assert_eq!(second.report, first.report);
    assert_eq!(second.stats.frames_selected, 1);
    assert_eq!(second.stats.frames_missing_base, 1);
    assert_eq!(second.stats.frames_resolved, 0);
}

#[test]
fn test_resolver_failure_is_local() {
    let script_dir = tempdir();
    let resolver = failing_resolver(script_dir.path());
    let (pipeline, _scripts) = setup_pipeline(move |config| config.resolver = resolver);
    let report = read_fixture("apple_crash_report.txt");

    let response = pipeline.process_report(&report).unwrap();

    // Every invocation exits non-zero, so all batched frames fail but the run completes.
    assert_eq!(response.report, report);
    assert_eq!(response.stats.frames_selected, 6);
    assert_eq!(response.stats.frames_failed, 5);
    assert_eq!(response.stats.frames_missing_base, 1);
}

#[test]
fn test_resolver_timeout_is_local() {
    let script_dir = tempdir();
    let resolver = hanging_resolver(script_dir.path());
    let (pipeline, _scripts) = setup_pipeline(move |config| {
        config.resolver = resolver;
        config.resolver_timeout = Some(Duration::from_millis(200));
    });
    let report = read_fixture("apple_crash_report.txt");

    let response = pipeline.process_report(&report).unwrap();

    assert_eq!(response.report, report);
    assert_eq!(response.stats.frames_failed, 5);
    assert_eq!(response.stats.frames_missing_base, 1);
}

#[test]
fn test_short_resolver_output_leaves_tail_unresolved() {
    // A resolver that answers only the first address of each batch: the remaining frames
    // count as unresolved rather than shifting answers onto the wrong lines.

    let script_dir = tempdir();
    let resolver = fake_resolver(
        script_dir.path(),
        "first-only-resolver",
        "shift 6\nprintf 'first_sym %s\\n' \"$1\"",
    );
    let (pipeline, _scripts) = setup_pipeline(move |config| config.resolver = resolver);
    let report = read_fixture("apple_crash_report.txt");

    let response = pipeline.process_report(&report).unwrap();

    assert!(response.report.contains(
        "0   MyFramework                   0x000000010c74b120 first_sym 0x000000010c74b120"
    ));
    assert!(response.report.contains(
        "1   MyFramework                   0x000000010c74a8e4 0x10c742000 + 35044"
    ));
    assert!(response.report.contains(
        "2   MyApp                         0x000000010c6e9a84 first_sym 0x000000010c6e9a84"
    ));

    assert_eq!(response.stats.frames_resolved, 2);
    assert_eq!(response.stats.frames_no_symbol, 3);
    assert_eq!(response.stats.frames_missing_base, 1);
}

#[test]
fn test_symbols_with_spaces_are_patched_verbatim() {
    let script_dir = tempdir();
    let resolver = fake_resolver(
        script_dir.path(),
        "objc-resolver",
        "shift 6\nfor addr in \"$@\"; do printf '%s\\n' '-[AppDelegate main] (AppDelegate.m:42)'; done",
    );
    let (pipeline, _scripts) = setup_pipeline(move |config| config.resolver = resolver);
    let report = read_fixture("apple_crash_report.txt");

    let response = pipeline.process_report(&report).unwrap();

    assert!(response.report.contains(
        "2   MyApp                         0x000000010c6e9a84 -[AppDelegate main] (AppDelegate.m:42)"
    ));
    assert_eq!(response.stats.frames_resolved, 5);
}

#[test]
fn test_missing_header_field_is_fatal() {
    let (pipeline, _scripts) = setup_pipeline(|_| ());
    let report = read_fixture("apple_crash_report.txt");
    let stripped: String = report
        .lines()
        .filter(|line| !line.starts_with("Code Type:"))
        .collect::<Vec<_>>()
        .join("\n");

    let error = pipeline.process_report(&stripped).unwrap_err();
    assert_eq!(error, ReportError::MissingField("Code Type"));
}

#[test]
fn test_empty_symbol_store_is_local() {
    setup();

    let script_dir = tempdir();
    let store_dir = tempdir();
    let config = Config {
        resolver: echo_resolver(script_dir.path()),
        ..Default::default()
    };
    let provider = DirectorySymbolStore::new(vec![store_dir.path().to_owned()]);
    let pipeline = Symbolicator::new(config, provider);

    let report = read_fixture("apple_crash_report.txt");
    let response = pipeline.process_report(&report).unwrap();

    assert_eq!(response.report, report);
    assert_eq!(response.stats.frames_missing_symbols, 5);
    assert_eq!(response.stats.frames_missing_base, 1);
}

#[test]
fn test_parallel_matches_sequential() {
    let (sequential, _scripts) = setup_pipeline(|_| ());
    let (parallel, _scripts2) = setup_pipeline(|config| config.parallel = true);
    let report = read_fixture("apple_crash_report.txt");

    let sequential_response = sequential.process_report(&report).unwrap();
    let parallel_response = parallel.process_report(&report).unwrap();

    assert_eq!(parallel_response.report, sequential_response.report);
    assert_eq!(parallel_response.stats, sequential_response.stats);
}

#[test]
fn test_fixture_arithmetic_is_consistent() {
    // The fixture's frame offsets must agree with its image bases, otherwise the other
    // tests assert on addresses a real resolver could never have produced.

    setup();
    let report = read_fixture("apple_crash_report.txt");

    for (address, base, offset) in [
        (0x10c74b120u64, 0x10c742000u64, 37152u64),
        (0x10c74a8e4, 0x10c742000, 35044),
        (0x10c6e9a84, 0x10c6e3000, 27268),
        (0x10c6e5c10, 0x10c6e3000, 11280),
        (0x10c6f1377, 0x10c6e3000, 58231),
    ] {
        assert_eq!(address, base + offset);
        assert!(report.contains(&format!("0x{base:x} + {offset}")));
    }
}
