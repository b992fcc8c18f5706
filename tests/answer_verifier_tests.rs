use tally::AnswerSpec;

#[test]
fn required_clauses_match_case_insensitively() {
    let spec = AnswerSpec::parse("hello\n[g1]a\n[g1]b\n");
    assert!(spec.verify("HELLO A"));
}

#[test]
fn unsatisfied_group_fails_even_when_required_passes() {
    let spec = AnswerSpec::parse("hello\n[g1]a\n[g1]b\n");
    assert!(!spec.verify("hello c"));
}

#[test]
fn any_group_member_satisfies_its_group() {
    let spec = AnswerSpec::parse("hello\n[g1]a\n[g1]b\n");
    assert!(spec.verify("hello b"));
}

#[test]
fn missing_required_clause_fails_immediately() {
    let spec = AnswerSpec::parse("hello\nworld\n");
    assert!(!spec.verify("hello"));
    assert!(spec.verify("hello world"));
}

#[test]
fn spec_without_optional_groups_passes_that_phase() {
    let spec = AnswerSpec::parse("sum = 42\n");
    assert!(spec.verify("The SUM = 42 was printed"));
}

#[test]
fn every_distinct_group_must_be_satisfied() {
    let spec = AnswerSpec::parse("[g1]a\n[g2]x\n");
    assert!(spec.verify("a x"));
    assert!(!spec.verify("a"));
    assert!(!spec.verify("x"));
}

#[test]
fn group_members_match_across_wrapped_lines() {
    // Newlines flatten to spaces, so an answer wrapped mid-line still
    // matches its group member.
    let spec = AnswerSpec::parse("[g1]two words\n");
    assert!(spec.verify("output: two\nwords"));
}

#[test]
fn required_clauses_do_not_flatten_newlines() {
    let spec = AnswerSpec::parse("two words\n");
    assert!(!spec.verify("two\nwords"));
}

#[test]
fn adding_a_required_clause_never_turns_failure_into_success() {
    let base = AnswerSpec::parse("hello\n");
    let stricter = AnswerSpec::parse("hello\nabsent\n");
    let output = "greetings only";
    assert!(!base.verify(output));
    assert!(!stricter.verify(output));
}

#[test]
fn removing_an_optional_group_never_turns_success_into_failure() {
    let with_group = AnswerSpec::parse("hello\n[g1]a\n");
    let without_group = AnswerSpec::parse("hello\n");
    let output = "hello a";
    assert!(with_group.verify(output));
    assert!(without_group.verify(output));
}

#[test]
fn adding_a_satisfying_member_never_turns_success_into_failure() {
    let spec = AnswerSpec::parse("[g1]a\n");
    let widened = AnswerSpec::parse("[g1]a\n[g1]zzz\n");
    let output = "a";
    assert!(spec.verify(output));
    assert!(widened.verify(output));
}

#[test]
fn empty_spec_accepts_anything() {
    let spec = AnswerSpec::parse("");
    assert!(spec.is_empty());
    assert!(spec.verify("whatever"));
}

#[test]
fn output_is_trimmed_before_matching() {
    let spec = AnswerSpec::parse("answer: 7\n");
    assert!(spec.verify("  \nanswer: 7\n  \n"));
}
