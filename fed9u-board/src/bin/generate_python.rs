use fed9u_board::info::FedInfo;

fn main() {
    println!("{}", facet_python::to_python::<FedInfo>(true));
}
