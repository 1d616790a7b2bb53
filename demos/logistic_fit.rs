use ccd_glm::{Column, DesignMatrix, Ccd, ConvergenceType, LogisticRegression};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let x1 = vec![0.0, 1.0, 0.0, 1.0, 1.0, 0.0];
    let y = vec![0.0, 1.0, 0.0, 1.0, 1.0, 0.0];

    let matrix = DesignMatrix::new(y.len())
        .with_intercept()?;
    let mut matrix = matrix;
    matrix.push_column("x1", Column::Dense(x1))?;

    let mut ccd = Ccd::<LogisticRegression>::new(&matrix, y, None)?;
    let flag = ccd.update(100, ConvergenceType::Gradient, 1e-6)?;

    println!("convergence flag: {:?}", flag);
    for j in 0..ccd.get_beta_size() {
        println!("{:<12} {:>10.4}", matrix.name(j), ccd.get_beta(j));
    }
    println!("log-likelihood: {:.4}", ccd.get_log_likelihood());
    Ok(())
}
