use clap::Parser;
use colored::Colorize;
use spice_expr::backends::DEFAULT_FUDGE_FACTOR;
use spice_expr::prelude::*;
use std::collections::HashSet;
use std::process;

#[derive(Parser)]
#[command(name = "spice-expr")]
#[command(about = "Parse, differentiate and evaluate SPICE behavioral expressions")]
#[command(version)]
struct Args {
    /// Expression to inspect, e.g. "V(out) * 10 + limit(I(R1), 0, 1m)"
    expression: String,

    /// Variable value as "<variable>=<value>", e.g. "V(in)=1.5" or "time=1u"
    #[arg(long = "set", value_name = "VARIABLE=VALUE")]
    assignments: Vec<String>,

    /// Tolerance for the division and power guards
    #[arg(long, default_value_t = DEFAULT_FUDGE_FACTOR)]
    fudge: f64,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red(), e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let builder = Builder::new(RealBackend::new().with_fudge_factor(args.fudge));
    let mut values = VariableMap::new();
    for assignment in &args.assignments {
        let (variable, value) = parse_assignment(assignment, &builder)?;
        values.insert(variable, value);
    }

    let node = expression_parser(&builder).parse(&args.expression)?;
    let variables = NodeFinder::new().build(&node);
    println!("{}: {}", "Tree".cyan(), node);
    println!(
        "{}: [{}]",
        "Variables".cyan(),
        variables.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );

    let missing = variables
        .iter()
        .filter(|variable| !values.contains(variable))
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        let of_interest: HashSet<VariableNode> = variables.iter().cloned().collect();
        match Differentiator::with_registry(builder.registry().clone()).derive(&node, &of_interest) {
            Some(derivatives) => {
                println!("{}:", "Derivatives".cyan());
                for (variable, derivative) in &derivatives {
                    println!("    d/d{variable}: {derivative}");
                }
            }
            None => println!("{}: {}", "Derivatives".cyan(), "not differentiable".red()),
        }
        println!(
            "{}: unset variables {} (use --set)",
            "Value".cyan(),
            missing.join(", ").yellow()
        );
        return Ok(());
    }

    let eq = Equation::new(&args.expression, &builder, &mut values)?;
    match eq.derivatives() {
        Some(derivatives) => {
            println!("{}:", "Derivatives".cyan());
            for (variable, derivative) in derivatives {
                let value = eq.derivative(variable)?();
                println!("    d/d{variable}: {derivative} = {value}");
            }
        }
        None => println!("{}: {}", "Derivatives".cyan(), "not differentiable".red()),
    }
    println!("{}: {}", "Value".cyan(), eq.eval());
    Ok(())
}

/// Splits "<variable>=<value>" and evaluates the value, which may use suffixes and constants.
fn parse_assignment(
    assignment: &str,
    builder: &Builder<RealBackend>,
) -> Result<(VariableNode, f64), Box<dyn std::error::Error>> {
    let (name, value) = assignment
        .split_once('=')
        .ok_or_else(|| format!("expected <variable>=<value>, got '{assignment}'"))?;

    let parser = expression_parser(builder);
    let variable = match parser.parse(name)? {
        Node::Variable(variable) => variable,
        other => return Err(format!("'{other}' is not a variable").into()),
    };
    let mut no_variables = VariableMap::new();
    let value = builder.build(&parser.parse(value)?, &mut no_variables)?();
    Ok((variable, value))
}

/// A parser sharing the builder's functions and constants.
fn expression_parser(builder: &Builder<RealBackend>) -> spice_expr::parser::Parser {
    spice_expr::parser::Parser::with_registry(builder.registry().clone())
}
