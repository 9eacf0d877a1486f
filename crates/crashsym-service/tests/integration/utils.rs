use crashsym_service::config::Config;
use crashsym_service::symbolicate::Symbolicator;
use crashsym_service::symbols::DirectorySymbolStore;
use crashsym_test as test;

pub use test::{
    echo_resolver, failing_resolver, fake_resolver, fixture, hanging_resolver, read_fixture,
    setup, tempdir,
};

/// Setup tests and create a symbolication pipeline over the fixture symbol store.
///
/// The resolver program is replaced with [`echo_resolver`], so every address resolves to
/// `<bundle>_sym <address>`. The returned [`TempDir`](test::TempDir) holds the resolver
/// script; keep it as guard until the test has finished.
///
/// The `update_config` closure can modify any default configuration, including pointing
/// `resolver` at a different fake.
pub fn setup_pipeline(
    update_config: impl FnOnce(&mut Config),
) -> (Symbolicator<DirectorySymbolStore>, test::TempDir) {
    test::setup();

    let script_dir = test::tempdir();

    let mut config = Config {
        resolver: test::echo_resolver(script_dir.path()),
        ..Default::default()
    };
    update_config(&mut config);

    let provider = DirectorySymbolStore::new(vec![test::fixture("symbols")]);
    (Symbolicator::new(config, provider), script_dir)
}
