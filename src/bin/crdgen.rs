use kube::CustomResourceExt;
use nimbus_k8s::crd::{CloudCluster, ComputeCluster};

fn main() {
    print!("{}", serde_yaml::to_string(&CloudCluster::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&ComputeCluster::crd()).unwrap());
}
