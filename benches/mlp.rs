use criterion::{Criterion, black_box, criterion_group, criterion_main};

use digit_mlp::{Inputs, Mlp, loss, pca};

fn mlp_forward_bench(c: &mut Criterion) {
    let mlp = Mlp::new_with_seed(&[40, 20, 10], 0).unwrap();
    let mut scratch = mlp.scratch();
    let input = vec![0.1_f32; mlp.input_dim()];

    c.bench_function("mlp_forward_40_20_10", |b| {
        b.iter(|| {
            let out = mlp.forward(black_box(&input), &mut scratch);
            black_box(out);
        })
    });
}

fn mlp_backward_bench(c: &mut Criterion) {
    let mlp = Mlp::new_with_seed(&[40, 20, 10], 0).unwrap();
    let mut scratch = mlp.scratch();
    let mut grads = mlp.gradients();
    let input = vec![0.1_f32; mlp.input_dim()];
    let mut target = vec![0.0_f32; mlp.output_dim()];
    target[3] = 1.0;

    mlp.forward(&input, &mut scratch);
    loss::cross_entropy_backward(scratch.output(), &target, grads.d_output_mut());

    c.bench_function("mlp_backward_40_20_10", |b| {
        b.iter(|| {
            let d_input = mlp.backward(black_box(&input), black_box(&scratch), &mut grads);
            black_box(d_input);
        })
    });
}

fn pca_reduce_bench(c: &mut Criterion) {
    let rows = 500;
    let cols = 64;
    let data: Vec<f32> = (0..rows * cols)
        .map(|i| ((i * 7919) % 255) as f32 / 255.0)
        .collect();
    let inputs = Inputs::from_flat(data, cols).unwrap();

    c.bench_function("pca_reduce_500x64_k16", |b| {
        b.iter(|| {
            let r = pca::reduce(black_box(&inputs), None, 16, pca::BasisOrder::Independent).unwrap();
            black_box(r);
        })
    });
}

criterion_group!(benches, mlp_forward_bench, mlp_backward_bench, pca_reduce_bench);
criterion_main!(benches);
