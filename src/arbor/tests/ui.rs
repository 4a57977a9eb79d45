#[test]
fn component_expansions_compile() {
    trybuild::TestCases::new().pass("tests/ui/pass/*.rs");
}
