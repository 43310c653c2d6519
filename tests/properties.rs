use exemplar::{
    rows_from_column, Example, Format, LearnResult, Program, RowId, Session, TransformProgram,
    TransformSynthesizer,
};
use proptest::prelude::*;

fn learn(
    inputs: &[String],
    output: &str,
) -> (Session<TransformSynthesizer>, LearnResult<TransformProgram>) {
    let mut session = Session::new(TransformSynthesizer);
    session.add_inputs(rows_from_column(inputs)).unwrap();
    session
        .add_constraints([Example::text(RowId(0), output)])
        .unwrap();
    let result = session.learn().unwrap();
    (session, result)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 24,
        ..ProptestConfig::default()
    })]

    #[test]
    fn prop_learned_programs_reproduce_examples(
        inputs in prop::collection::vec("[A-Za-z0-9 ,.-]{0,10}", 1..4),
        output in "[A-Za-z ,]{0,8}",
    ) {
        let (session, _) = learn(&inputs, &output);
        if let Ok(program) = session.program() {
            let row = session.rows().get(RowId(0)).unwrap();
            prop_assert_eq!(program.run(row), Some(output.clone()));
        }
    }

    #[test]
    fn prop_learning_is_deterministic(
        inputs in prop::collection::vec("[A-Z][a-z]{1,5} [A-Z][a-z]{1,5}", 1..4),
    ) {
        let output = inputs[0].split(' ').last().unwrap_or("").to_string();
        let (a, a_result) = learn(&inputs, &output);
        let (b, b_result) = learn(&inputs, &output);
        prop_assert_eq!(a.serialize(Format::Json).ok(), b.serialize(Format::Json).ok());
        prop_assert_eq!(a_result.significant_inputs, b_result.significant_inputs);
    }
}
