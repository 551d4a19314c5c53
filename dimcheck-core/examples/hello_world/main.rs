use dimcheck_core::{CallArgs, DimScope, Dims, ShapeCheck};

fn main() {
    env_logger::init();

    let scope = DimScope::from_env();
    let layer = ShapeCheck::builder("linear")
        .arg("x", "B, n..., I")
        .arg("w", "I, O")
        .output("B, n..., O")
        .match_callees(true)
        .build()
        .unwrap();
    let bias = ShapeCheck::builder("add_bias")
        .arg("y", "..., O")
        .arg("b", "O")
        .output("..., O")
        .build()
        .unwrap();

    let x = Dims(vec![8, 16, 32]);
    let w = vec![vec![0.0f32; 10]; 32];
    let args = CallArgs::new().arg(&x).arg(&w);

    let y = layer
        .call(&scope, &args, |scope| {
            let y = Dims(vec![8, 16, 10]);
            bias.call(scope, &CallArgs::new().arg(&y).arg(&[0.0f32; 10]), |_| Ok(y.clone()))
        })
        .unwrap();
    dbg!(&y);

    // A bias of the wrong width is caught inside the layer.
    let err = layer
        .call(&scope, &args, |scope| {
            let y = Dims(vec![8, 16, 10]);
            bias.call(scope, &CallArgs::new().arg(&y).arg(&[0.0f32; 12]), |_| Ok(y.clone()))
        })
        .unwrap_err();
    println!("{err}");
}
