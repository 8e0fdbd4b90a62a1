fn main() {
    afm_plot::cli::run();
}
