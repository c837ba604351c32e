//! Provides an example of how to use bayes-core to perform inference on a Bayesian Network.
//!
//! The student network of Koller & Friedman, Figure 3.4.

use bayes_core as bc;
use bc::GraphicalModel;
use ndarray::array;

use std::rc::Rc;

fn main() -> bc::Result<()> {
    let difficulty = bc::Variable::labelized("D", &["easy", "hard"])?;
    let intelligence = bc::Variable::labelized("I", &["low", "high"])?;
    let grade = bc::Variable::labelized("G", &["A", "B", "C"])?;
    let sat = bc::Variable::labelized("S", &["low", "high"])?;
    let letter = bc::Variable::labelized("L", &["weak", "strong"])?;

    /////////////////////////////////////////////////////
    // Step 1: Build Model
    let model = Rc::new(build_model(StudentVariables(difficulty, intelligence, grade, sat, letter))?);
    let (d, i, s, l) = (
        model.id_from_name("D")?,
        model.id_from_name("I")?,
        model.id_from_name("S")?,
        model.id_from_name("L")?,
    );

    /////////////////////////////////////////////////////
    // Step 2: Build an inference engine, targeting the intelligence
    let config = bc::EngineConfig::default().with_elimination(bc::EliminationHeuristic::MinFill);
    let mut engine = bc::TargetedInference::with_model(
        Rc::clone(&model),
        bc::VariableElimination::with_config(config)
    );
    engine.add_target(i)?;

    /////////////////////////////////////////////////////
    // Step 3: Observe some evidence
    engine.add_evidence_label(d, "easy")?;
    engine.add_evidence_label(l, "strong")?;
    engine.add_evidence_label(s, "low")?;

    /////////////////////////////////////////////////////
    // Step 4: Run a Conditional Query
    let p = engine.posterior(i)?;
    let var = model.variable(i)?;
    for (val, prob) in p.values().iter().enumerate() {
        println!("P(I = {} | D = easy, S = low, L = strong) = {:.4}", var.label(val)?, prob);
    }
    println!("H(I | e) = {:.4} bits", engine.entropy(i)?);

    Ok(())
}

struct StudentVariables(bc::Variable, bc::Variable, bc::Variable, bc::Variable, bc::Variable);

fn build_model(vars: StudentVariables) -> bc::Result<bc::model::DirectedModel> {
    let StudentVariables(d, i, g, s, l) = vars;

    ///////////////////////////////////////////////////
    // Step 1: Build CPTs for variables with parents, parents first
    let cpt_g = bc::Factor::from_array(
        vec![i.clone(), d.clone(), g.clone()],
        array![
            [[0.3, 0.4, 0.3], [0.05, 0.25, 0.7]],
            [[0.9, 0.08, 0.02], [0.5, 0.3, 0.2]]
        ].into_dyn()
    )?;

    let cpt_s = bc::Factor::from_array(
        vec![i.clone(), s.clone()],
        array![
            [0.95, 0.05],
            [0.2, 0.8]
        ].into_dyn()
    )?;

    let cpt_l = bc::Factor::from_array(
        vec![g.clone(), l.clone()],
        array![
            [0.1, 0.9],
            [0.4, 0.6],
            [0.99, 0.01]
        ].into_dyn()
    )?;

    ///////////////////////////////////////////////////
    // Step 2: Build the Model
    bc::model::DirectedModelBuilder::new()
        .with_variable(&d, &[], bc::Initialization::Binomial(0.6))
        .with_variable(&i, &[], bc::Initialization::Binomial(0.7))
        .with_variable(&g, &[i.clone(), d.clone()], bc::Initialization::Table(cpt_g))
        .with_variable(&s, &[i.clone()], bc::Initialization::Table(cpt_s))
        .with_variable(&l, &[g.clone()], bc::Initialization::Table(cpt_l))
        .build()
}
